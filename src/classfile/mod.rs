mod code;
pub(crate) mod opcodes;
mod reader;

#[cfg(test)]
pub(crate) mod assembler;

pub use reader::{class_name, decode_class, parse_class};

pub(crate) use code::{opcode_length, padding, read_u16, read_u32};

/// Access flag bits shared by classes, fields and methods.
pub mod access {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SYNCHRONIZED: u16 = 0x0020;
    pub const VOLATILE: u16 = 0x0040;
    pub const BRIDGE: u16 = 0x0040;
    pub const TRANSIENT: u16 = 0x0080;
    pub const VARARGS: u16 = 0x0080;
    pub const NATIVE: u16 = 0x0100;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const STRICT: u16 = 0x0800;
    pub const SYNTHETIC: u16 = 0x1000;
    pub const ANNOTATION: u16 = 0x2000;
    pub const ENUM: u16 = 0x4000;
}

/// A decoded class file.
#[derive(Clone, Debug, Default)]
pub struct RawClass {
    pub name: String,
    pub access: u16,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub signature: Option<String>,
    /// Outer class declared through `InnerClasses` or `EnclosingMethod`.
    pub outer_name: Option<String>,
    pub source_file: Option<String>,
    pub fields: Vec<RawField>,
    pub methods: Vec<RawMethod>,
    pub record_components: Vec<RecordComponent>,
}

/// A field declaration.
#[derive(Clone, Debug, Default)]
pub struct RawField {
    pub name: String,
    pub descriptor: String,
    pub access: u16,
    pub signature: Option<String>,
    pub constant: Option<Constant>,
}

/// A method declaration and its decoded body, if any.
#[derive(Clone, Debug, Default)]
pub struct RawMethod {
    pub name: String,
    pub descriptor: String,
    pub access: u16,
    pub signature: Option<String>,
    pub code: Option<Code>,
}

/// Record component from the `Record` attribute.
#[derive(Clone, Debug)]
pub struct RecordComponent {
    pub name: String,
    pub descriptor: String,
}

/// Decoded `Code` attribute.
#[derive(Clone, Debug, Default)]
pub struct Code {
    pub max_locals: u16,
    pub bytecode: Vec<u8>,
    pub instructions: Vec<Instruction>,
    pub exception_handlers: Vec<ExceptionHandler>,
    pub local_vars: Vec<LocalVar>,
}

/// Exception handler metadata from the Code attribute.
#[derive(Clone, Debug)]
pub struct ExceptionHandler {
    pub start_pc: u32,
    pub end_pc: u32,
    pub handler_pc: u32,
    pub catch_type: Option<String>,
}

/// Entry of the `LocalVariableTable` attribute.
#[derive(Clone, Debug)]
pub struct LocalVar {
    pub start_pc: u32,
    pub length: u32,
    pub name: String,
    pub descriptor: String,
    pub index: u16,
}

/// Bytecode instruction captured for analysis.
#[derive(Clone, Debug)]
pub struct Instruction {
    pub offset: u32,
    pub opcode: u8,
    pub kind: InstructionKind,
}

/// Instruction kinds the feature extractor cares about.
#[derive(Clone, Debug)]
pub enum InstructionKind {
    Invoke(CallSite),
    InvokeDynamic(DynamicSite),
    Field(FieldAccess),
    Type { op: TypeOp, class: String },
    Constant(Constant),
    Other,
}

/// Call site extracted from bytecode.
#[derive(Clone, Debug)]
pub struct CallSite {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub kind: CallKind,
    pub is_interface: bool,
}

/// Call opcode classification.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum CallKind {
    Virtual,
    Interface,
    Special,
    Static,
}

/// `invokedynamic` site with its bootstrap method already looked up.
#[derive(Clone, Debug)]
pub struct DynamicSite {
    pub name: String,
    pub descriptor: String,
    pub bootstrap: Handle,
    /// Method handles passed as static bootstrap arguments (lambda bodies).
    pub handle_args: Vec<Handle>,
}

/// Field instruction.
#[derive(Clone, Debug)]
pub struct FieldAccess {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub is_write: bool,
    pub is_static: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TypeOp {
    New,
    CheckCast,
    InstanceOf,
    NewArray,
}

/// Constant pool `MethodHandle` resolved to its member reference.
#[derive(Clone, Debug)]
pub struct Handle {
    pub kind: u8,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub is_interface: bool,
}

impl Handle {
    /// Reference kinds 1-4 address fields, 5-9 address methods.
    pub fn is_field(&self) -> bool {
        (1..=4).contains(&self.kind)
    }
}

/// Loadable constant.
#[derive(Clone, Debug)]
pub enum Constant {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(String),
    MethodType(String),
    Handle(Handle),
    Dynamic,
}

impl Constant {
    /// Human-readable value used for field initializers.
    pub fn describe(&self) -> String {
        match self {
            Constant::Int(value) => value.to_string(),
            Constant::Float(value) => format!("{value}f"),
            Constant::Long(value) => format!("{value}L"),
            Constant::Double(value) => format!("{value}d"),
            Constant::String(value) => format!("{value:?}"),
            Constant::Class(name) => format!("{name}.class"),
            Constant::MethodType(desc) => desc.clone(),
            Constant::Handle(handle) => {
                format!("{}.{}{}", handle.owner, handle.name, handle.descriptor)
            }
            Constant::Dynamic => "<dynamic>".to_string(),
        }
    }
}
