//! Bytecode actions executed by the player.
//!
//! Codes below 0x80 are single-byte actions without arguments; codes from
//! 0x80 on are followed by a 16-bit length and an argument body.

macro_rules! basic_actions {
    ($($name:ident = $code:expr,)*) => {
        /// An action without arguments, encoded as its code alone.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum BasicAction {
            $($name = $code,)*
        }

        impl BasicAction {
            /// Every basic action, in code order.
            pub const ALL: &'static [BasicAction] = &[$(BasicAction::$name,)*];

            /// Creates a BasicAction from its wire representation.
            pub fn from_u8(v: u8) -> Option<BasicAction> {
                match v {
                    $($code => Some(BasicAction::$name),)*
                    _ => None,
                }
            }
        }
    };
}

basic_actions! {
    NextFrame = 0x04,
    PrevFrame = 0x05,
    Play = 0x06,
    Stop = 0x07,
    ToggleQuality = 0x08,
    StopSounds = 0x09,
    Add = 0x0A,
    Subtract = 0x0B,
    Multiply = 0x0C,
    Divide = 0x0D,
    Equals = 0x0E,
    Less = 0x0F,
    And = 0x10,
    Or = 0x11,
    Not = 0x12,
    StringEquals = 0x13,
    StringLength = 0x14,
    StringExtract = 0x15,
    Pop = 0x17,
    ToInteger = 0x18,
    GetVariable = 0x1C,
    SetVariable = 0x1D,
    SetTarget2 = 0x20,
    StringAdd = 0x21,
    GetProperty = 0x22,
    SetProperty = 0x23,
    CloneSprite = 0x24,
    RemoveSprite = 0x25,
    Trace = 0x26,
    StartDrag = 0x27,
    EndDrag = 0x28,
    StringLess = 0x29,
    Throw = 0x2A,
    CastOp = 0x2B,
    ImplementsOp = 0x2C,
    RandomNumber = 0x30,
    MbStringLength = 0x31,
    CharToAscii = 0x32,
    AsciiToChar = 0x33,
    GetTime = 0x34,
    MbStringExtract = 0x35,
    MbCharToAscii = 0x36,
    MbAsciiToChar = 0x37,
    Delete = 0x3A,
    Delete2 = 0x3B,
    DefineLocal = 0x3C,
    CallFunction = 0x3D,
    Return = 0x3E,
    Modulo = 0x3F,
    NewObject = 0x40,
    DefineLocal2 = 0x41,
    InitArray = 0x42,
    InitObject = 0x43,
    TypeOf = 0x44,
    TargetPath = 0x45,
    Enumerate = 0x46,
    Add2 = 0x47,
    Less2 = 0x48,
    Equals2 = 0x49,
    ToNumber = 0x4A,
    ToString = 0x4B,
    PushDuplicate = 0x4C,
    StackSwap = 0x4D,
    GetMember = 0x4E,
    SetMember = 0x4F,
    Increment = 0x50,
    Decrement = 0x51,
    CallMethod = 0x52,
    NewMethod = 0x53,
    InstanceOf = 0x54,
    Enumerate2 = 0x55,
    BitAnd = 0x60,
    BitOr = 0x61,
    BitXor = 0x62,
    BitLShift = 0x63,
    BitRShift = 0x64,
    BitURShift = 0x65,
    StrictEquals = 0x66,
    Greater = 0x67,
    StringGreater = 0x68,
    Extends = 0x69,
}

/// A value pushed onto the stack by [`Action::Push`].
#[derive(Debug, Clone, PartialEq)]
pub enum PushValue {
    String(String),
    Float(f32),
    Null,
    Undefined,
    Register(u8),
    Bool(bool),
    Double(f64),
    Integer(i32),
    /// Index into the constant pool, stored in one byte.
    Constant8(u8),
    /// Index into the constant pool, stored in two bytes.
    Constant16(u16),
}

impl PushValue {
    /// Returns the value type code for wire encoding.
    pub fn value_type(&self) -> u8 {
        match self {
            PushValue::String(_) => 0,
            PushValue::Float(_) => 1,
            PushValue::Null => 2,
            PushValue::Undefined => 3,
            PushValue::Register(_) => 4,
            PushValue::Bool(_) => 5,
            PushValue::Double(_) => 6,
            PushValue::Integer(_) => 7,
            PushValue::Constant8(_) => 8,
            PushValue::Constant16(_) => 9,
        }
    }
}

/// Defines a function whose body follows the definition.
#[derive(Debug, Clone, PartialEq)]
pub struct DefineFunction {
    /// Empty for anonymous functions.
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Action>,
}

/// One action of a script.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Basic(BasicAction),
    GotoFrame(u16),
    GetUrl {
        url: String,
        target: String,
    },
    StoreRegister(u8),
    ConstantPool(Vec<String>),
    WaitForFrame {
        frame: u16,
        skip_count: u8,
    },
    SetTarget(String),
    GotoLabel(String),
    WaitForFrame2 {
        skip_count: u8,
    },
    DefineFunction(DefineFunction),
    Push(Vec<PushValue>),
    /// Branch offset in bytes, relative to the next action.
    Jump(i16),
    GetUrl2 {
        /// Bits 7-6: send method, bit 1: load target, bit 0: load variables.
        flags: u8,
    },
    /// Branch offset in bytes, relative to the next action.
    If(i16),
    Call,
    GotoFrame2 {
        play: bool,
        scene_bias: Option<u16>,
    },
    /// An action without a registered decoder, kept verbatim.
    Unknown {
        code: u8,
        data: Vec<u8>,
    },
}

impl Action {
    /// Code of the action that terminates an action list.
    pub const END: u8 = 0x00;

    /// Returns the action code for wire encoding.
    pub fn code(&self) -> u8 {
        match self {
            Action::Basic(basic) => *basic as u8,
            Action::GotoFrame(_) => 0x81,
            Action::GetUrl { .. } => 0x83,
            Action::StoreRegister(_) => 0x87,
            Action::ConstantPool(_) => 0x88,
            Action::WaitForFrame { .. } => 0x8A,
            Action::SetTarget(_) => 0x8B,
            Action::GotoLabel(_) => 0x8C,
            Action::WaitForFrame2 { .. } => 0x8D,
            Action::Push(_) => 0x96,
            Action::Jump(_) => 0x99,
            Action::GetUrl2 { .. } => 0x9A,
            Action::DefineFunction(_) => 0x9B,
            Action::If(_) => 0x9D,
            Action::Call => 0x9E,
            Action::GotoFrame2 { .. } => 0x9F,
            Action::Unknown { code, .. } => *code,
        }
    }
}
