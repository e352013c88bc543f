#![cfg(test)]

use core::fmt;

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use hex_literal::hex;

use crate::config::*;
use crate::console::{print_mem, Console, Line};
use crate::error::Error;
use crate::menu::{menu, App, MenuId, Operation};
use crate::session::{AesKeySource, Reconstruction, Session, State};
use crate::sim::{RamFlash, SharedBus, SimKeystore, SimPlatform};
use crate::store::{AcLocation, KeyCodeSlot, KeyCodeStore};
use crate::traits::{flash, keystore::FactoryKeyCode, puf};
use crate::types::*;

/// Console fed from a fixed list of lines, collecting everything printed.
struct ScriptedConsole<'a> {
    i: usize,
    input: &'a [&'a str],
    output: std::string::String,
}

impl<'a> ScriptedConsole<'a> {
    fn new(input: &'a [&'a str]) -> Self {
        ScriptedConsole { i: 0, input, output: std::string::String::new() }
    }
}

impl fmt::Write for ScriptedConsole<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.output.push_str(s);
        Ok(())
    }
}

impl Console for ScriptedConsole<'_> {
    fn read_line(&mut self) -> Option<Line> {
        let next = self.input.get(self.i)?;
        self.i += 1;
        let mut line = Line::new();
        line.push_str(next).ok()?;
        Some(line)
    }
}

fn started_session() -> (Session<SimPlatform>, SharedBus) {
    let platform = SimPlatform::new(b"test device");
    let bus = platform.bus();
    let mut session = Session::new(platform);
    let ac = session.enroll().unwrap();
    session.start(&ac).unwrap();
    (session, bus)
}

fn test_key_code(index: u8, fill: u8) -> KeyCode {
    let mut bytes = [fill; MIN_KEY_CODE_SIZE];
    bytes[..4].copy_from_slice(&[1, index, 0, 2]);
    KeyCode::from_slice(&bytes).unwrap()
}

fn store() -> KeyCodeStore<RamFlash, SimKeystore> {
    KeyCodeStore::new(RamFlash::new(), SimKeystore::default())
}

#[test]
fn key_code_header_checks() {
    assert_eq!(key_code_check(&hex!("00000002")), 0);
    assert_eq!(key_code_check(&hex!("010f0000")), 0);
    assert_eq!(key_code_check(&hex!("02000002")), 1);
    assert_eq!(key_code_check(&hex!("00100002")), 2);
    assert_eq!(key_code_check(&hex!("00000040")), 3);

    // type is checked before index, index before size
    assert_eq!(key_code_check(&hex!("07200000")), 1);
    assert_eq!(key_code_check(&hex!("011000ff")), 2);
}

#[test]
fn key_sizes() {
    assert_eq!(KeySize::MAX.bytes(), 512);
    assert_eq!(KeySize::from_code(0).unwrap().bits(), 4096);
    assert_eq!(KeySize::from_code(2).unwrap().bytes(), 16);
    assert_eq!(KeySize::from_code(64), Err(HeaderError::InvalidSize));

    assert_eq!(KeySize::from_operator(4).unwrap().bytes(), 32);
    assert_eq!(KeySize::from_operator(64).unwrap().code(), 0);
    assert_eq!(KeySize::from_operator(65), Err(Error::InvalidInput));

    assert_eq!(key_code_size(8), 52);
    assert_eq!(key_code_size(16), 52);
    assert_eq!(key_code_size(32), 52);
    assert_eq!(key_code_size(40), 60);
    assert_eq!(key_code_size(512), MAX_KEY_CODE_SIZE);
    assert_eq!(MAX_KEY_CODE_SIZE, 532);

    assert_eq!(KeyIndex::new(16), Err(Error::InvalidInput));
    assert!(KeyIndex::new(0).unwrap().routes_to_bus());
}

#[test]
fn corrupt_header_assumes_largest_key() {
    let info = KeyCodeInfo::of(&hex!("05030002"));
    assert_eq!(info.check, Err(HeaderError::InvalidType));
    assert_eq!(info.key_size, MAX_KEY_SIZE);
    assert_eq!(info.key_code_size(), MAX_KEY_CODE_SIZE);
    assert_eq!(info.index, 3);

    let info = KeyCodeInfo::of(&hex!("00050004"));
    assert_eq!(info.check, Ok(()));
    assert_eq!(info.key_size, 32);
    assert_eq!(info.type_name(), "user");
}

#[test]
fn activation_code_round_trips() {
    let mut store = store();
    let ac = ActivationCode::new([0x5a; ACTIVATION_CODE_SIZE]);

    assert_eq!(store.load_activation_code(AcLocation::Ram), Err(Error::Uninitialized));
    assert_eq!(store.load_activation_code(AcLocation::Flash), Err(Error::Uninitialized));

    store.store_activation_code(AcLocation::Ram, &ac).unwrap();
    assert_eq!(store.load_activation_code(AcLocation::Ram).unwrap(), ac);

    store.store_activation_code(AcLocation::Flash, &ac).unwrap();
    assert_eq!(store.load_activation_code(AcLocation::Flash).unwrap(), ac);
    assert_eq!(&store.flash().image()[..ACTIVATION_CODE_SIZE], &ac.as_bytes()[..]);
}

#[test]
fn flash_update_keeps_other_fields() {
    let mut store = store();
    let ac = ActivationCode::new([0xa5; ACTIVATION_CODE_SIZE]);
    let first = test_key_code(1, 0x11);
    let second = test_key_code(2, 0x22);

    store.store_activation_code(AcLocation::Flash, &ac).unwrap();
    store.store_key_code(KeyCodeSlot::Flash(0), &first).unwrap();
    store.store_key_code(KeyCodeSlot::Flash(1), &second).unwrap();

    assert_eq!(store.load_activation_code(AcLocation::Flash).unwrap(), ac);
    assert_eq!(store.load_key_code(KeyCodeSlot::Flash(0)).unwrap(), first);
    assert_eq!(store.load_key_code(KeyCodeSlot::Flash(1)).unwrap(), second);

    // overwriting a slot leaves the others alone
    let third = test_key_code(3, 0x33);
    store.store_key_code(KeyCodeSlot::Flash(0), &third).unwrap();
    assert_eq!(store.load_key_code(KeyCodeSlot::Flash(0)).unwrap(), third);
    assert_eq!(store.load_key_code(KeyCodeSlot::Flash(1)).unwrap(), second);
    assert_eq!(store.load_activation_code(AcLocation::Flash).unwrap(), ac);
}

#[test]
fn ram_key_code_slots() {
    let mut store = store();
    let key_code = test_key_code(7, 0x77);

    assert_eq!(store.load_key_code(KeyCodeSlot::Ram(1)), Err(Error::Uninitialized));
    store.store_key_code(KeyCodeSlot::Ram(1), &key_code).unwrap();
    assert_eq!(store.load_key_code(KeyCodeSlot::Ram(1)).unwrap(), key_code);
    assert_eq!(store.load_key_code(KeyCodeSlot::Ram(0)), Err(Error::Uninitialized));

    assert_eq!(store.store_key_code(KeyCodeSlot::Ram(NUM_OF_KEYS), &key_code), Err(Error::InvalidInput));
    assert_eq!(store.load_key_code(KeyCodeSlot::Flash(NUM_OF_KEYS)), Err(Error::InvalidInput));
}

#[test]
fn factory_store_is_read_only() {
    let mut store = store();
    let ac = ActivationCode::new([1; ACTIVATION_CODE_SIZE]);

    assert_eq!(store.store_activation_code(AcLocation::Factory, &ac), Err(Error::InvalidOperation));
    assert_eq!(
        store.store_key_code(KeyCodeSlot::Factory(FactoryKeyCode::UserKek), &test_key_code(1, 1)),
        Err(Error::InvalidOperation)
    );

    // nothing provisioned
    assert_eq!(store.load_activation_code(AcLocation::Factory), Err(Error::Uninitialized));
    assert_eq!(
        store.load_key_code(KeyCodeSlot::Factory(FactoryKeyCode::SecureBoot)),
        Err(Error::Uninitialized)
    );
}

#[test]
fn flash_verify_failure_is_reported() {
    let mut flash = RamFlash::new();
    flash.flip_bit_on_program(FLASHSTORE_BASE + 0x10);
    let mut store = KeyCodeStore::new(flash, SimKeystore::default());

    let ac = ActivationCode::new([0x5a; ACTIVATION_CODE_SIZE]);
    assert_eq!(
        store.store_activation_code(AcLocation::Flash, &ac),
        Err(Error::FlashVerifyFailed { address: FLASHSTORE_BASE + 0x10 })
    );
}

#[test]
fn flash_controller_failures_are_reported() {
    let mut store = store();
    store.format().unwrap();
    let ac = ActivationCode::new([0x5a; ACTIVATION_CODE_SIZE]);
    store.store_activation_code(AcLocation::Flash, &ac).unwrap();

    // erase fails before anything changed
    store.flash_mut().fail_next_erase();
    assert_eq!(
        store.store_key_code(KeyCodeSlot::Flash(1), &test_key_code(1, 0x11)),
        Err(Error::Flash(flash::Error::Failure))
    );
    assert_eq!(store.load_activation_code(AcLocation::Flash).unwrap(), ac);

    // program fails after the erase, the record is gone
    store.flash_mut().fail_next_program();
    assert_eq!(
        store.store_key_code(KeyCodeSlot::Flash(1), &test_key_code(1, 0x11)),
        Err(Error::Flash(flash::Error::Failure))
    );
    assert!(store.flash().image().iter().all(|byte| *byte == 0xFF));

    // unmapped reads fail instead of returning zeros
    let store = KeyCodeStore::new(RamFlash::with_region(FLASHSTORE_BASE, FLASH_PAGE_SIZE), SimKeystore::default());
    assert_eq!(
        store.load_activation_code(AcLocation::Flash),
        Err(Error::Flash(flash::Error::Illegal))
    );
}

#[test]
fn format_only_touches_blank_flash() {
    let mut store = store();
    assert_eq!(store.format(), Ok(true));
    assert!(store.flash().image().iter().all(|byte| *byte == 0));
    assert_eq!(store.load_activation_code(AcLocation::Flash), Err(Error::Uninitialized));

    let ac = ActivationCode::new([0x42; ACTIVATION_CODE_SIZE]);
    store.store_activation_code(AcLocation::Flash, &ac).unwrap();
    assert_eq!(store.format(), Ok(false));
    assert_eq!(store.load_activation_code(AcLocation::Flash).unwrap(), ac);
}

#[test]
fn start_needs_an_activation_code() {
    let mut session = Session::new(SimPlatform::new(b"test device"));
    assert_eq!(session.start_from(AcLocation::Ram), Err(Error::Uninitialized));
    assert_eq!(session.start_from(AcLocation::Flash), Err(Error::Uninitialized));
    assert_eq!(
        session.start(&ActivationCode::new([0; ACTIVATION_CODE_SIZE])),
        Err(Error::Uninitialized)
    );
    assert_eq!(session.state(), State::Uninitialized);
}

#[test]
fn activation_code_is_bound_to_the_device() {
    let mut one = Session::new(SimPlatform::new(b"device one"));
    let ac = one.enroll().unwrap();

    let mut other = Session::new(SimPlatform::new(b"device two"));
    assert_eq!(other.start(&ac), Err(Error::Puf(puf::Error::CommandFailed)));
    assert!(other.flags().status.error);
    assert!(!other.state().is_started());

    one.start(&ac).unwrap();
    assert_eq!(one.state(), State::Started);
}

#[test]
fn generate_key_needs_a_started_puf() {
    let mut session = Session::new(SimPlatform::new(b"test device"));
    session.init().unwrap();
    assert_eq!(
        session.generate_key(KeySource::Intrinsic, KeyIndex::new(1).unwrap(), KeySize::from_operator(2).unwrap()),
        Err(Error::Uninitialized)
    );
}

#[test]
fn index_zero_key_goes_to_the_key_bus() {
    let (mut session, bus) = started_session();

    let key_code = session
        .generate_key(
            KeySource::User(b"0123456789abcdef"),
            KeyIndex::new(0).unwrap(),
            KeySize::from_operator(2).unwrap(),
        )
        .unwrap();
    assert_eq!(key_code.len(), 52);
    assert_eq!(&key_code.as_bytes()[..4], &hex!("00000002"));
    assert_eq!(session.state(), State::KeyGenerated);

    session.store_key_code(KeyCodeSlot::Ram(0), &key_code).unwrap();
    let loaded = session.load_key_code(KeyCodeSlot::Ram(0)).unwrap();
    assert_eq!(loaded, key_code);

    assert_eq!(
        session.reconstruct_key(&loaded, KeyDestination::Aes).unwrap(),
        Reconstruction::Delivered(KeyDestination::Aes)
    );
    assert_eq!(session.state(), State::KeyReconstructed);
    assert!(session.flags().status.success);
    assert!(!session.flags().status.error);
    assert_eq!(bus.borrow().slot(KeyDestination::Aes), Some(&b"0123456789abcdef"[..]));
    assert_eq!(bus.borrow().slot(KeyDestination::Prince1), None);

    // the secret key now drives the AES engine
    let report = session.aes_roundtrip(b"hello", AesKeySource::Secret).unwrap();
    assert_eq!(report.key, None);
    assert_eq!(&report.plain[..], b"hello           ");
    assert_eq!(report.decrypted, report.plain);

    let mut expected = report.plain;
    Aes128::new_from_slice(b"0123456789abcdef").unwrap().encrypt_block(&mut expected);
    assert_eq!(report.cipher, expected);
}

#[test]
fn secret_aes_key_needs_delivery() {
    let (mut session, _bus) = started_session();
    assert_eq!(session.aes_roundtrip(b"data", AesKeySource::Secret), Err(Error::Cipher));
}

#[test]
fn intrinsic_key_through_flash() {
    let (mut session, _bus) = started_session();

    let key_code = session
        .generate_key(KeySource::Intrinsic, KeyIndex::new(5).unwrap(), KeySize::from_operator(4).unwrap())
        .unwrap();
    assert_eq!(key_code.len(), 52);
    assert_eq!(&key_code.as_bytes()[..4], &hex!("01050004"));

    session.store_key_code(KeyCodeSlot::Flash(1), &key_code).unwrap();
    let loaded = session.load_key_code(KeyCodeSlot::Flash(1)).unwrap();
    assert_eq!(loaded, key_code);

    let key = match session.reconstruct_key(&loaded, KeyDestination::Aes).unwrap() {
        Reconstruction::Plaintext(key) => key,
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(key.len(), 32);
    assert_eq!(
        session.reconstruct_key(&loaded, KeyDestination::Aes).unwrap(),
        Reconstruction::Plaintext(key.clone())
    );

    let report = session
        .aes_roundtrip(b"0123456789abcdef0123456789abcdef", AesKeySource::KeyCode(&loaded))
        .unwrap();
    assert_eq!(report.key, Some(key));
    assert_eq!(&report.plain[..], b"0123456789abcdef");
    assert_eq!(report.decrypted, report.plain);
    assert_ne!(report.cipher, report.plain);
}

#[test]
fn user_key_is_padded_with_spaces() {
    let (mut session, _bus) = started_session();

    let key_code = session
        .generate_key(KeySource::User(b"secret"), KeyIndex::new(3).unwrap(), KeySize::from_operator(2).unwrap())
        .unwrap();
    match session.reconstruct_key(&key_code, KeyDestination::Aes).unwrap() {
        Reconstruction::Plaintext(key) => assert_eq!(&key[..], b"secret          "),
        other => panic!("unexpected {:?}", other),
    }

    // longer passwords are cut to the key size
    let key_code = session
        .generate_key(
            KeySource::User(b"0123456789abcdefXYZ"),
            KeyIndex::new(4).unwrap(),
            KeySize::from_operator(2).unwrap(),
        )
        .unwrap();
    match session.reconstruct_key(&key_code, KeyDestination::Aes).unwrap() {
        Reconstruction::Plaintext(key) => assert_eq!(&key[..], b"0123456789abcdef"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn corrupt_key_code_fails_reconstruction() {
    let (mut session, _bus) = started_session();
    let mut bytes = [0u8; MIN_KEY_CODE_SIZE];
    bytes[..4].copy_from_slice(&hex!("07010002"));
    let key_code = KeyCode::from_slice(&bytes).unwrap();

    assert_eq!(
        session.reconstruct_key(&key_code, KeyDestination::Aes),
        Err(Error::Puf(puf::Error::CommandFailed))
    );
}

#[test]
fn zeroize_and_blocks_clear_allow_bits() {
    let (mut session, _bus) = started_session();
    let flags = session.flags();
    assert!(flags.allow.set_key && flags.allow.get_key);
    assert!(!flags.allow.enroll && !flags.allow.start);
    assert!(flags.status.success);

    session.block_set_key();
    assert!(!session.flags().allow.set_key);
    assert!(session.flags().allow.get_key);
    assert_eq!(
        session.generate_key(KeySource::Intrinsic, KeyIndex::new(1).unwrap(), KeySize::from_operator(2).unwrap()),
        Err(Error::NotAllowed)
    );

    session.zeroize().unwrap();
    assert_eq!(session.flags().allow, puf::Allow::default());
    assert_eq!(session.state(), State::Stopped);

    session.init().unwrap();
    assert!(session.flags().allow.enroll);
    session.block_enroll();
    assert!(!session.flags().allow.enroll);
    assert_eq!(session.enroll().map(|_| ()), Err(Error::NotAllowed));
}

#[test]
fn enroll_repeats_until_blocked() {
    let mut session = Session::new(SimPlatform::new(b"test device"));
    let first = session.enroll().unwrap();
    let second = session.enroll().unwrap();
    assert_ne!(first, second);
    assert_eq!(session.state(), State::Enrolled);

    // both codes stay valid on this device
    session.start(&first).unwrap();
    session.start(&second).unwrap();

    session.block_enroll();
    assert_eq!(session.enroll().map(|_| ()), Err(Error::NotAllowed));
    session.start(&second).unwrap();
    assert_eq!(session.state(), State::Started);
}

#[test]
fn factory_provisioned_device() {
    let mut platform = SimPlatform::new(b"factory device");
    let ac = platform.provision_factory().unwrap();
    let bus = platform.bus();
    let mut session = Session::new(platform);

    assert_eq!(session.start_from(AcLocation::Factory).unwrap(), ac);

    let kek = session.load_key_code(KeyCodeSlot::Factory(FactoryKeyCode::UserKek)).unwrap();
    match session.reconstruct_key(&kek, KeyDestination::Aes).unwrap() {
        Reconstruction::Plaintext(key) => assert_eq!(key.len(), 32),
        other => panic!("unexpected {:?}", other),
    }

    let prince = session.load_key_code(KeyCodeSlot::Factory(FactoryKeyCode::Prince0)).unwrap();
    assert_eq!(
        session.reconstruct_key(&prince, KeyDestination::Prince1).unwrap(),
        Reconstruction::Delivered(KeyDestination::Prince1)
    );
    assert_eq!(bus.borrow().slot(KeyDestination::Prince1).map(|key| key.len()), Some(16));
}

#[test]
fn hex_dump_layout() {
    let mut out = std::string::String::new();
    print_mem(&mut out, &[0xde, 0xad, 0xbe, 0xef], 2).unwrap();
    assert_eq!(out, "\r\n   0: de ad \r\n   2: be ef \r\n");
}

#[test]
fn menu_tables() {
    assert_eq!(menu(MenuId::Main).len(), 7);
    assert_eq!(menu(MenuId::Misc).len(), 6);
    assert_eq!(menu(MenuId::SetKey).len(), 3);

    assert_eq!(menu(MenuId::Main).select(0), None);
    assert_eq!(menu(MenuId::Main).select(1), Some(Operation::EnrollPuf));
    assert_eq!(menu(MenuId::Main).select(7), Some(Operation::MainBack));
    assert_eq!(menu(MenuId::Main).select(8), None);
    assert_eq!(menu(MenuId::Misc).select(6), Some(Operation::MiscBack));
    assert_eq!(menu(MenuId::SetKey).items[1].label, "Generate intrinsic key code");
}

#[test]
fn menu_navigation() {
    let input = ["3", "6", "4", "3", "9", "7"];
    let mut app = App::new(Session::new(SimPlatform::new(b"test device")), ScriptedConsole::new(&input));

    assert_eq!(app.step(), Ok(true));
    assert_eq!(app.current_menu(), MenuId::Misc);
    assert_eq!(app.step(), Ok(true));
    assert_eq!(app.current_menu(), MenuId::Main);
    assert_eq!(app.step(), Ok(true));
    assert_eq!(app.current_menu(), MenuId::SetKey);
    assert_eq!(app.step(), Ok(true));
    assert_eq!(app.current_menu(), MenuId::Main);

    assert_eq!(app.step(), Ok(true));
    assert_eq!(app.current_menu(), MenuId::Main);
    assert!(app.console().output.contains("Number 9 is bad input"));

    assert_eq!(app.step(), Ok(true));
    assert_eq!(app.current_menu(), MenuId::Main);
    assert!(app.console().output.contains("Going back"));

    // input exhausted
    assert_eq!(app.step(), Ok(false));
}

#[test]
fn menu_key_lifecycle() {
    let input = [
        "1", "2", // enroll, AC to flash
        "2", "2", // start from flash
        "4", "1", "3", "2", "hunter2", "1", // user key, index 3, 128 bit, RAM keycode0
        "3", // back
        "5", "1", // get key from RAM keycode0
    ];
    let mut app = App::new(Session::new(SimPlatform::new(b"test device")), ScriptedConsole::new(&input));
    app.run().unwrap();

    let output = &app.console().output;
    assert!(output.contains("Activation Code (AC) was created!"));
    assert!(output.contains("The PUF is started"));
    assert!(output.contains("Key Code (KC) is generated successfully"));
    assert!(output.contains("Key code stored"));
    assert!(output.contains("Key Code index > 0, Key will be printed"));
    // once while generating, once reconstructed
    assert_eq!(output.matches("68 75 6e 74 65 72 32 20 20").count(), 2);
    assert_eq!(app.session().state(), State::KeyReconstructed);
    assert!(app.session().store().load_activation_code(AcLocation::Flash).is_ok());
}

#[test]
fn menu_prompts_repeat_on_bad_input() {
    let input = ["1", "7", "x", "1"];
    let mut app = App::new(Session::new(SimPlatform::new(b"test device")), ScriptedConsole::new(&input));
    assert_eq!(app.step(), Ok(true));

    assert!(app.console().output.contains("Input value is bad: 7"));
    assert!(app.session().store().load_activation_code(AcLocation::Ram).is_ok());
    assert_eq!(app.session().state(), State::Enrolled);
}

#[test]
fn menu_bad_key_index_aborts() {
    let input = ["4", "1", "16"];
    let mut app = App::new(Session::new(SimPlatform::new(b"test device")), ScriptedConsole::new(&input));
    assert_eq!(app.step(), Ok(true));
    assert_eq!(app.step(), Ok(true));

    assert!(app.console().output.contains("Bad key index, should be 0..15"));
    assert_eq!(app.current_menu(), MenuId::SetKey);
}
