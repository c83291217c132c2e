//! Abstract representation of the Java program we want to run.
use crate::jvm::{AttributeInfo, CPInfo, JVMClassFile, ParseError};

use regex::Regex;

/// The name of the method executed to run the class file.
pub const MAIN_METHOD: &str = "main";
/// The descriptor string for `main()`: takes a `String[]`, returns void.
pub const MAIN_DESCRIPTOR: &str = "([Ljava/lang/String;)V";

/// Primitive types appearing in method descriptors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BaseTypeKind {
    Int,
    Void,
    String,
    List,
}

/// Decoded descriptor type. Lists carry their element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    pub t: BaseTypeKind,
    pub sub_t: Option<Box<Type>>,
}

/// Executable method representation for the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    pub descriptor: String,
    pub arg_types: Vec<Type>,
    pub return_type: Type,
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
}

impl Method {
    /// Number of parameter slots transferred on `invokestatic`. Every
    /// supported parameter type occupies a single 32-bit slot.
    pub fn num_args(&self) -> usize {
        self.arg_types.len()
    }
}

/// Representation of the single class a run executes: its constant pool
/// and its methods with names and descriptors already resolved.
#[derive(Debug, Clone)]
pub struct Program {
    pub constant_pool: Vec<CPInfo>,
    pub methods: Vec<Method>,
}

impl Program {
    /// Builds a program from a parsed class file. Methods without a
    /// `Code` attribute (abstract or native) are skipped, they can never
    /// be invoked by the supported instruction subset.
    pub fn new(class_file: &JVMClassFile) -> Result<Self, ParseError> {
        let constants = class_file.constant_pool();
        let mut methods = Vec::new();
        for method_info in class_file.methods() {
            let name = utf8_at(constants, method_info.name_index())?;
            let descriptor =
                utf8_at(constants, method_info.descriptor_index())?;
            let (arg_types, return_type) = parse_method_types(&descriptor)?;

            let Some(AttributeInfo::CodeAttribute {
                max_stack,
                max_locals,
                code,
            }) = method_info.attributes().get("Code")
            else {
                continue;
            };

            methods.push(Method {
                name,
                descriptor,
                arg_types,
                return_type,
                max_stack: *max_stack,
                max_locals: *max_locals,
                code: code.clone(),
            });
        }

        Ok(Self {
            constant_pool: constants.to_vec(),
            methods,
        })
    }

    /// Returns the index of the entry point, the static `main` method
    /// taking a `String[]` and returning void.
    pub fn entry_point(&self) -> Option<usize> {
        self.methods.iter().position(|method| {
            method.name == MAIN_METHOD && method.descriptor == MAIN_DESCRIPTOR
        })
    }

    /// Resolves a `Methodref` constant-pool index (as read from an
    /// `invokestatic` operand) to the index of the target method.
    pub fn find_method(&self, method_ref: u16) -> Option<usize> {
        let CPInfo::ConstantMethodRef {
            name_and_type_index,
            ..
        } = self.constant_pool.get(method_ref as usize)?
        else {
            return None;
        };
        let CPInfo::ConstantNameAndType {
            name_index,
            descriptor_index,
        } = self.constant_pool.get(*name_and_type_index as usize)?
        else {
            return None;
        };
        let name = utf8_at(&self.constant_pool, *name_index).ok()?;
        let descriptor =
            utf8_at(&self.constant_pool, *descriptor_index).ok()?;
        self.methods.iter().position(|method| {
            method.name == name && method.descriptor == descriptor
        })
    }

    /// Looks up an integer literal by its one-based constant-pool index,
    /// as used by `ldc`.
    pub fn integer_constant(&self, index: u16) -> Option<i32> {
        match self.constant_pool.get(index as usize) {
            Some(CPInfo::ConstantInteger { bytes }) => Some(*bytes),
            _ => None,
        }
    }
}

fn utf8_at(pool: &[CPInfo], index: u16) -> Result<String, ParseError> {
    match pool.get(index as usize) {
        Some(CPInfo::ConstantUtf8 { bytes }) => Ok(bytes.clone()),
        _ => Err(ParseError::InvalidConstantReference(index)),
    }
}

/// Splits a method descriptor into its argument types and return type.
/// Fails with `ParseError::MalformedDescriptor` when the descriptor does
/// not follow the `(args)ret` shape, e.g. an array marker with no
/// element type behind it.
pub(crate) fn parse_method_types(
    descriptor: &str,
) -> Result<(Vec<Type>, Type), ParseError> {
    let malformed =
        || ParseError::MalformedDescriptor(descriptor.to_string());
    let re = Regex::new(r"\(([^\)]*)\)([^$]+)").unwrap();
    let caps = re.captures(descriptor).ok_or_else(malformed)?;
    let arg_string = caps.get(1).map_or("", |m| m.as_str());
    let return_type_string = caps.get(2).map_or("V", |m| m.as_str());

    let mut arg_types = Vec::new();
    let mut rest = arg_string;
    while !rest.is_empty() {
        let (t, consumed) = decode_type(rest).ok_or_else(malformed)?;
        arg_types.push(t);
        rest = &rest[consumed..];
    }
    let (return_type, _) =
        decode_type(return_type_string).ok_or_else(malformed)?;
    Ok((arg_types, return_type))
}

fn void_type() -> Type {
    Type {
        t: BaseTypeKind::Void,
        sub_t: None,
    }
}

/// Decodes the leading type of a descriptor fragment, returning it along
/// with the number of bytes it occupies in the fragment. `None` means the
/// fragment is empty where a type was required.
fn decode_type(type_str: &str) -> Option<(Type, usize)> {
    match type_str.chars().next()? {
        'I' => Some((
            Type {
                t: BaseTypeKind::Int,
                sub_t: None,
            },
            1,
        )),
        'V' => Some((void_type(), 1)),
        '[' => {
            let (sub, consumed) = decode_type(&type_str[1..])?;
            Some((
                Type {
                    t: BaseTypeKind::List,
                    sub_t: Some(Box::new(sub)),
                },
                consumed + 1,
            ))
        }
        // Class references; the only one the subset meets is
        // java/lang/String in main's descriptor.
        _ => {
            let end = type_str.find(';').map_or(type_str.len(), |i| i + 1);
            Some((
                Type {
                    t: BaseTypeKind::String,
                    sub_t: None,
                },
                end,
            ))
        }
    }
}
