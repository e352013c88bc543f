//! Text menu driving the PUF session.
//!
//! Each menu is a fixed list of (label, operation) pairs. The operator picks
//! an entry by its 1-based position, the operation runs to completion, and
//! the loop shows the PUF flags and the (possibly different) menu again.

use core::convert::TryFrom;
use core::fmt;

use crate::config::*;
use crate::console::{print_flags, print_key_code, print_mem, read_number, read_word, Console, Input};
use crate::error::Error;
use crate::session::{AesKeySource, Reconstruction, Session};
use crate::store::{AcLocation, KeyCodeSlot};
use crate::traits::{keystore::FactoryKeyCode, Platform};
use crate::types::{KeyCode, KeyDestination, KeyIndex, KeySize, KeySource};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MenuId {
    Main,
    Misc,
    SetKey,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    EnrollPuf,
    StartPuf,
    OpenMisc,
    OpenSetKey,
    GetKey,
    AesBlock,
    MainBack,

    InitPuf,
    StopPuf,
    Zeroize,
    BlockEnroll,
    BlockSetKey,
    MiscBack,

    GenerateUserKey,
    GenerateIntrinsicKey,
    SetKeyBack,
}

pub struct MenuItem {
    pub label: &'static str,
    pub operation: Operation,
}

pub struct Menu {
    pub id: MenuId,
    pub items: &'static [MenuItem],
}

impl Menu {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Operation at 1-based `position`.
    pub fn select(&self, position: u32) -> Option<Operation> {
        let index = (position as usize).checked_sub(1)?;
        self.items.get(index).map(|item| item.operation)
    }
}

macro_rules! menu {
    ($id:expr, [$($label:expr => $operation:ident,)*]) => {
        Menu {
            id: $id,
            items: &[$(MenuItem { label: $label, operation: Operation::$operation },)*],
        }
    };
}

static MAIN_MENU: Menu = menu!(MenuId::Main, [
    "Enroll PUF" => EnrollPuf,
    "Start and load AC to PUF" => StartPuf,
    "Misc. PUF commands" => OpenMisc,
    "Generate Key Code" => OpenSetKey,
    "Get Key from Key Code" => GetKey,
    "Encrypt / Decrypt AES block" => AesBlock,
    "Back" => MainBack,
]);

static MISC_MENU: Menu = menu!(MenuId::Misc, [
    "Init PUF" => InitPuf,
    "Stop PUF" => StopPuf,
    "Zeroize PUF" => Zeroize,
    "Disable Enroll PUF" => BlockEnroll,
    "Disable Key Generation" => BlockSetKey,
    "Back" => MiscBack,
]);

static SET_KEY_MENU: Menu = menu!(MenuId::SetKey, [
    "Generate user key code" => GenerateUserKey,
    "Generate intrinsic key code" => GenerateIntrinsicKey,
    "Back" => SetKeyBack,
]);

pub fn menu(id: MenuId) -> &'static Menu {
    match id {
        MenuId::Main => &MAIN_MENU,
        MenuId::Misc => &MISC_MENU,
        MenuId::SetKey => &SET_KEY_MENU,
    }
}

/// Why a menu operation stopped early.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Abort {
    /// Input closed mid-operation.
    Closed,
    Console,
}

impl From<fmt::Error> for Abort {
    fn from(_: fmt::Error) -> Self {
        Abort::Console
    }
}

type Outcome = core::result::Result<(), Abort>;

pub struct App<P: Platform, C: Console> {
    session: Session<P>,
    console: C,
    menu: MenuId,
}

impl<P: Platform, C: Console> App<P, C> {
    pub fn new(session: Session<P>, console: C) -> Self {
        App { session, console, menu: MenuId::Main }
    }

    pub fn current_menu(&self) -> MenuId {
        self.menu
    }

    pub fn session(&self) -> &Session<P> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<P> {
        &mut self.session
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn into_parts(self) -> (Session<P>, C) {
        (self.session, self.console)
    }

    pub fn banner(&mut self) -> fmt::Result {
        let out = &mut self.console;
        out.write_str("\r\n**************************************************\r\n")?;
        out.write_str(" The PUF and AES application note example\r\n")?;
        out.write_str(" Use this example to Enroll and start PUF and then\r\n")?;
        out.write_str(" generate KEYs and their KEY Code. Then recover KEY\r\n")?;
        out.write_str(" and display them or sent to AES engine. Follow menu\r\n")?;
        out.write_str("***************************************************\r\n\n")
    }

    /// Run until the console input is closed.
    pub fn run(&mut self) -> fmt::Result {
        while self.step()? {}
        info!("console closed, leaving menu loop");
        Ok(())
    }

    /// One round: flags, menu, selection, operation.
    /// Returns `false` once input is closed.
    pub fn step(&mut self) -> core::result::Result<bool, fmt::Error> {
        let flags = self.session.flags();
        let menu = menu(self.menu);

        let out = &mut self.console;
        out.write_str("\n\r***************** PUF state **********************\n\r")?;
        print_flags(out, &flags)?;
        out.write_str("\n\r**************************************************\n\r")?;
        out.write_str("\n\r")?;
        for (i, item) in menu.items.iter().enumerate() {
            write!(out, "{}. {}\r\n", i + 1, item.label)?;
        }

        let operation = match read_number(out) {
            Input::Closed => return Ok(false),
            Input::Bad => {
                out.write_str("\n\rNot a number, bad input\r\n")?;
                None
            }
            Input::Value(selection) => {
                let operation = menu.select(selection);
                if operation.is_none() {
                    write!(out, "\n\rNumber {} is bad input\r\n", selection)?;
                }
                operation
            }
        };
        let operation = match operation {
            Some(operation) => operation,
            None => return Ok(true),
        };

        debug!("menu {:?}: {:?}", self.menu, operation);
        match self.dispatch(operation) {
            Ok(()) => Ok(true),
            Err(Abort::Closed) => Ok(false),
            Err(Abort::Console) => Err(fmt::Error),
        }
    }

    fn dispatch(&mut self, operation: Operation) -> Outcome {
        use Operation::*;
        match operation {
            EnrollPuf => {
                self.enroll()?;
                self.menu = MenuId::Main;
            }
            StartPuf => {
                self.start()?;
                self.menu = MenuId::Main;
            }
            OpenMisc => self.menu = MenuId::Misc,
            OpenSetKey => self.menu = MenuId::SetKey,
            GetKey => {
                self.get_key()?;
                self.menu = MenuId::Main;
            }
            AesBlock => {
                self.aes_block()?;
                self.menu = MenuId::Main;
            }
            MainBack => self.console.write_str("\n\n\rGoing back \r\n\n")?,

            InitPuf => match self.session.init() {
                Ok(()) => self.console.write_str("\n\nPUF Init successful\r\n")?,
                Err(_) => self.console.write_str("\n\nPUF Init failed\r\n")?,
            },
            StopPuf => {
                self.session.stop();
                self.console.write_str("\n\nPUF stopped\r\n")?;
            }
            Zeroize => match self.session.zeroize() {
                Ok(()) => self.console.write_str("\n\nZeroize successful\r\n")?,
                Err(_) => self.console.write_str("\n\nZeroize failed\r\n")?,
            },
            BlockEnroll => {
                self.session.block_enroll();
                self.console.write_str("\n\nEnroll disabled until reset\r\n")?;
            }
            BlockSetKey => {
                self.session.block_set_key();
                self.console.write_str("\n\nKey generation disabled until reset\r\n")?;
            }
            MiscBack => self.menu = MenuId::Main,

            GenerateUserKey => self.generate_key(true)?,
            GenerateIntrinsicKey => self.generate_key(false)?,
            SetKeyBack => self.menu = MenuId::Main,
        }
        Ok(())
    }

    fn report(&mut self, what: &str, error: Error) -> Outcome {
        write!(self.console, "\r\n{}: {}\r\n", what, error)?;
        Ok(())
    }

    /// Prompt until one of `1..=count` is entered.
    fn choose(&mut self, prompt: &str, count: u32, complaint: &str) -> core::result::Result<u32, Abort> {
        loop {
            self.console.write_str(prompt)?;
            match read_number(&mut self.console) {
                Input::Closed => return Err(Abort::Closed),
                Input::Value(value) if value >= 1 && value <= count => return Ok(value),
                Input::Value(value) => write!(self.console, "\r\n{} {}\r\n", complaint, value)?,
                Input::Bad => write!(self.console, "\r\n{}\r\n", complaint)?,
            }
        }
    }

    fn enroll(&mut self) -> Outcome {
        let ac = match self.session.enroll() {
            Ok(ac) => ac,
            Err(error) => {
                self.report("Activation Code (AC) wasn't created", error)?;
                return Ok(());
            }
        };

        self.console.write_str("\r\nActivation Code (AC) was created!\r\n\nActivation Code:")?;
        print_mem(&mut self.console, ac.as_bytes(), 16)?;

        let location = match self.choose(
            "\r\nStore AC to\r\n1. RAM activationCode\r\n2. FLASH activationkeycode\r\n",
            2,
            "Input value is bad:",
        )? {
            1 => AcLocation::Ram,
            _ => AcLocation::Flash,
        };

        match self.session.store_activation_code(location, &ac) {
            Ok(()) => write!(self.console, "\r\nAC stored to {:?}\r\n", location)?,
            Err(error) => self.report("Storing AC failed", error)?,
        }
        Ok(())
    }

    fn start(&mut self) -> Outcome {
        let location = match self.choose(
            "\nChoose AC source\r\n1. RAM\r\n2. Flash\r\n3. CMPA key store\r\n",
            3,
            "Bad value",
        )? {
            1 => AcLocation::Ram,
            2 => AcLocation::Flash,
            _ => AcLocation::Factory,
        };

        let ac = match self.session.store().load_activation_code(location) {
            Ok(ac) => ac,
            Err(error) => return self.report("Loading AC failed", error),
        };
        self.console.write_str("Activation Code:")?;
        print_mem(&mut self.console, ac.as_bytes(), 16)?;

        match self.session.start(&ac) {
            Ok(()) => self.console.write_str("\nThe PUF is started\r\n")?,
            Err(error) => self.report("Error during Start", error)?,
        }
        Ok(())
    }

    fn generate_key(&mut self, user: bool) -> Outcome {
        self.console
            .write_str("\nEnter key index 0..15\r\nIn order to send key to AES or PRINCE use key index 0\r\n")?;
        let index = match read_number(&mut self.console) {
            Input::Closed => return Err(Abort::Closed),
            Input::Value(value) => KeyIndex::new(value).ok(),
            Input::Bad => None,
        };
        let index = match index {
            Some(index) => index,
            None => {
                self.console.write_str("\nBad key index, should be 0..15 \r\n")?;
                return Ok(());
            }
        };

        self.console.write_str(
            "\n\nEnter key size 1..64 (64..4096)-bits. \r\nAES allowed key size: 128/192/256-bit \r\nPRINCE allowed key size 128-bit\r\n",
        )?;
        let size = match read_number(&mut self.console) {
            Input::Closed => return Err(Abort::Closed),
            Input::Value(value) => KeySize::from_operator(value).ok(),
            Input::Bad => None,
        };
        let size = match size {
            Some(size) => size,
            None => {
                self.console.write_str("\nBad key size, should be 1..64 \r\n")?;
                return Ok(());
            }
        };

        let mut password = [b' '; MAX_KEY_SIZE];
        let key_size = size.bytes();
        let result = if user {
            write!(
                self.console,
                "\nEnter your user password {}B long \r\nshorter will be padded by SPACEs \r\nlonger cuted\r\n",
                key_size
            )?;
            let word = read_word(&mut self.console).ok_or(Abort::Closed)?;
            let used = word.len().min(key_size);
            password[..used].copy_from_slice(&word.as_bytes()[..used]);

            write!(
                self.console,
                "\n\r\nGenerating user Key Code (KC) with Index {}, and Key length {}-bits\r\n\nKey:",
                index.value(),
                size.bits()
            )?;
            print_mem(&mut self.console, &password[..key_size], 16)?;
            self.session.generate_key(KeySource::User(&password[..key_size]), index, size)
        } else {
            write!(
                self.console,
                "\r\nGenerating Intrinsic Key Code (KC) with Index {}, and Key length {}-bits\r\n",
                index.value(),
                size.bits()
            )?;
            self.session.generate_key(KeySource::Intrinsic, index, size)
        };

        let key_code = match result {
            Ok(key_code) => key_code,
            Err(error) => return self.report("Error setting key! Is the PUF started", error),
        };

        self.console.write_str("\r\nKey Code (KC) is generated successfully\r\n")?;
        print_key_code(&mut self.console, key_code.as_bytes(), 16)?;
        self.store_key_code(&key_code)
    }

    fn store_key_code(&mut self, key_code: &KeyCode) -> Outcome {
        let slot = match self.choose(
            "\r\nStore key code to \r\n1. RAM keycode0\r\n2. RAM keycode1\r\n3. FLASH keycode0\r\n4. FLASH keycode1\r\n",
            2 * NUM_OF_KEYS as u32,
            "Input value is bad:",
        )? as usize
            - 1
        {
            n if n < NUM_OF_KEYS => KeyCodeSlot::Ram(n),
            n => KeyCodeSlot::Flash(n - NUM_OF_KEYS),
        };

        match self.session.store_key_code(slot, key_code) {
            Ok(()) => write!(self.console, "\r\nKey code stored to {:?}\r\n", slot)?,
            Err(error) => self.report("Storing key code failed", error)?,
        }
        Ok(())
    }

    /// Ask for a key code slot and load it; `None` if loading failed.
    fn load_key_code(&mut self) -> core::result::Result<Option<KeyCode>, Abort> {
        let choice = self.choose(
            "\n\rReconstruct key from keycode\r\n1. RAM keycode0\r\n2. RAM keycode1\n\r3. FLASH keycode0\r\n4. FLASH keycode1\r\n5. CMPA key store\r\n",
            2 * NUM_OF_KEYS as u32 + 1,
            "Bad number entered",
        )? as usize
            - 1;

        let slot = if choice < NUM_OF_KEYS {
            KeyCodeSlot::Ram(choice)
        } else if choice < 2 * NUM_OF_KEYS {
            KeyCodeSlot::Flash(choice - NUM_OF_KEYS)
        } else {
            self.console.write_str("\r\nEnter key code to be loaded")?;
            for (i, kind) in FactoryKeyCode::ALL.iter().enumerate() {
                write!(self.console, "\r\n{}. {}", i + 1, kind.label())?;
            }
            let kind = self.choose("\r\n", FactoryKeyCode::ALL.len() as u32, "Bad number, enter again")?;
            KeyCodeSlot::Factory(FactoryKeyCode::ALL[kind as usize - 1])
        };

        match self.session.load_key_code(slot) {
            Ok(key_code) => Ok(Some(key_code)),
            Err(error) => {
                self.report("Error loading code", error)?;
                Ok(None)
            }
        }
    }

    fn describe(&mut self, key_code: &KeyCode) -> Outcome {
        let info = key_code.info();
        if let Err(error) = info.check {
            write!(self.console, "\r\nError in Key Code header ({})", error as u32)?;
        }
        let shown = info.key_code_size().min(key_code.len());
        print_key_code(&mut self.console, &key_code.as_bytes()[..shown], 16)?;
        write!(
            self.console,
            "\r\nReconstruction of keycode:\r\nsize {} bytes, index {}, type {}\r\n",
            info.key_size,
            info.index,
            info.type_name()
        )?;
        Ok(())
    }

    fn get_key(&mut self) -> Outcome {
        let key_code = match self.load_key_code()? {
            Some(key_code) => key_code,
            None => return Ok(()),
        };
        self.describe(&key_code)?;

        if !key_code.info().routes_to_bus() {
            self.console.write_str("\r\nKey Code index > 0, Key will be printed")?;
            match self.session.reconstruct_key(&key_code, KeyDestination::Aes) {
                Ok(Reconstruction::Plaintext(key)) => {
                    self.console.write_str("\r\nKey:\r\n")?;
                    print_mem(&mut self.console, &key, 16)?;
                }
                Ok(Reconstruction::Delivered(_)) => {}
                Err(error) => self.report("Error reconstructing user key", error)?,
            }
            return Ok(());
        }

        self.console.write_str("\r\nKey Code index = 0, Key will sent to internal hw. bus")?;
        let slot = self.choose(
            "\r\nInput keyslot value <1..4>\r\nKey will be send to \r\n1: AES\r\n2: Prince 1\r\n3: Prince 2\r\n4: Prince 3\r\n",
            NUM_KEY_SLOTS as u32,
            "Bad value, enter again",
        )?;
        let destination = match KeyDestination::try_from((slot - 1) as u8) {
            Ok(destination) => destination,
            Err(_) => return Ok(()),
        };

        match self.session.reconstruct_key(&key_code, destination) {
            Ok(_) => write!(self.console, "\r\nKey was sent to HW bus ({})!\r\n", destination.name())?,
            Err(error) => self.report("Error reconstructing key to HW bus", error)?,
        }
        Ok(())
    }

    fn aes_block(&mut self) -> Outcome {
        self.console
            .write_str("\r\nInput plain text 16B long, shorter will be padded with spaces 0x20\r\n")?;
        let text = read_word(&mut self.console).ok_or(Abort::Closed)?;

        self.console.write_str("\r\nAES key:\r\n1. Secret key\r\n2. User key\r\n")?;
        let secret = match read_number(&mut self.console) {
            Input::Closed => return Err(Abort::Closed),
            Input::Value(1) => true,
            _ => false,
        };

        let result = if secret {
            self.console.write_str("\r\nSecret Key. Will use Key already sent to AES\r\n")?;
            self.session.aes_roundtrip(text.as_bytes(), AesKeySource::Secret)
        } else {
            self.console.write_str("\r\nChoose key code to be used by AES\r\n")?;
            let key_code = match self.load_key_code()? {
                Some(key_code) => key_code,
                None => return Ok(()),
            };
            self.describe(&key_code)?;
            self.session.aes_roundtrip(text.as_bytes(), AesKeySource::KeyCode(&key_code))
        };

        let report = match result {
            Ok(report) => report,
            Err(error) => return self.report("AES failed", error),
        };

        if let Some(key) = &report.key {
            self.console.write_str("\r\nKey:\r\n")?;
            print_mem(&mut self.console, key, 16)?;
        }
        self.console.write_str("\r\nPlain data:\r\n")?;
        print_mem(&mut self.console, &report.plain, 16)?;
        self.console.write_str("\r\nCipher:\r\n")?;
        print_mem(&mut self.console, &report.cipher, 16)?;
        self.console.write_str("\r\nDecrypted:\r\n")?;
        print_mem(&mut self.console, &report.decrypted, 16)?;
        Ok(())
    }
}
