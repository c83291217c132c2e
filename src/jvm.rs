//! Lightweight parser and decoder for JVM bytecode class files.
//!
//! Only the parts of the class-file format the interpreter consumes are
//! decoded: the constant pool, and for each method its name, descriptor
//! and `Code` attribute (`max_stack`, `max_locals`, bytecode). Everything
//! else (interfaces, fields, exception tables, nested attributes) is
//! length-skipped.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};

const CLASS_FILE_MAGIC: u32 = 0xCAFE_BABE;

type Result<T> = std::result::Result<T, ParseError>;

/// `ParseError` represents the ways a class file can fail to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    InvalidMagic(u32),
    UnexpectedEof,
    UnsupportedConstantTag(u8),
    InvalidConstantReference(u16),
    MalformedUtf8,
    MalformedDescriptor(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidMagic(magic) => {
                write!(f, "invalid class file magic 0x{magic:08x}")
            }
            Self::UnexpectedEof => {
                write!(f, "class file ended unexpectedly")
            }
            Self::UnsupportedConstantTag(tag) => {
                write!(f, "unsupported constant pool tag {tag}")
            }
            Self::InvalidConstantReference(index) => {
                write!(f, "constant pool index {index} is not a Utf8 entry")
            }
            Self::MalformedUtf8 => {
                write!(f, "constant pool holds malformed Utf8 bytes")
            }
            Self::MalformedDescriptor(descriptor) => {
                write!(f, "malformed method descriptor {descriptor:?}")
            }
        }
    }
}

// Reads inside a `Cursor` only ever fail by running off the end.
impl From<io::Error> for ParseError {
    fn from(_: io::Error) -> Self {
        Self::UnexpectedEof
    }
}

/// Constant pool entry. Entries the interpreter never touches are kept as
/// `Unsupported` placeholders so one-based pool indices stay aligned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CPInfo {
    ConstantUtf8 {
        bytes: String,
    },
    ConstantInteger {
        bytes: i32,
    },
    ConstantClass {
        name_index: u16,
    },
    ConstantString {
        string_index: u16,
    },
    ConstantFieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    ConstantMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    ConstantInterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    ConstantNameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    Unsupported {
        tag: u8,
    },
}

/// Decoded method attributes. Only `Code` carries data we execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeInfo {
    CodeAttribute {
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
    },
}

/// Raw method entry as it appears in the class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    access_flags: u16,
    name_index: u16,
    descriptor_index: u16,
    attributes: HashMap<String, AttributeInfo>,
}

impl MethodInfo {
    pub fn name_index(&self) -> u16 {
        self.name_index
    }

    pub fn descriptor_index(&self) -> u16 {
        self.descriptor_index
    }

    pub fn access_flags(&self) -> u16 {
        self.access_flags
    }

    pub fn attributes(&self) -> &HashMap<String, AttributeInfo> {
        &self.attributes
    }
}

/// In-memory representation of a parsed class file.
#[derive(Debug, Clone, PartialEq)]
pub struct JVMClassFile {
    minor_version: u16,
    major_version: u16,
    constant_pool: Vec<CPInfo>,
    methods: Vec<MethodInfo>,
}

impl JVMClassFile {
    /// Constant pool with a placeholder at slot 0, so the one-based
    /// indices the format uses apply directly.
    pub fn constant_pool(&self) -> &[CPInfo] {
        &self.constant_pool
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    pub fn version(&self) -> (u16, u16) {
        (self.major_version, self.minor_version)
    }
}

/// Reads a class file from disk into a byte buffer.
pub fn read_class_file(path: &Path) -> io::Result<Vec<u8>> {
    fs::read(path)
}

/// Parser for the binary class-file format.
pub struct JVMParser;

impl JVMParser {
    /// Parses a class file out of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<JVMClassFile> {
        let mut cursor = Cursor::new(bytes);
        let magic = cursor.read_u32::<BigEndian>()?;
        if magic != CLASS_FILE_MAGIC {
            return Err(ParseError::InvalidMagic(magic));
        }
        let minor_version = cursor.read_u16::<BigEndian>()?;
        let major_version = cursor.read_u16::<BigEndian>()?;

        let constant_pool = Self::parse_constant_pool(&mut cursor)?;

        // access_flags, this_class, super_class.
        cursor.seek(SeekFrom::Current(6))?;

        let interfaces_count = cursor.read_u16::<BigEndian>()?;
        cursor.seek(SeekFrom::Current(i64::from(interfaces_count) * 2))?;

        let fields_count = cursor.read_u16::<BigEndian>()?;
        for _ in 0..fields_count {
            // access_flags, name_index, descriptor_index.
            cursor.seek(SeekFrom::Current(6))?;
            let attributes_count = cursor.read_u16::<BigEndian>()?;
            Self::skip_attributes(&mut cursor, attributes_count)?;
        }

        let methods_count = cursor.read_u16::<BigEndian>()?;
        let mut methods = Vec::with_capacity(methods_count as usize);
        for _ in 0..methods_count {
            methods.push(Self::parse_method(&mut cursor, &constant_pool)?);
        }

        // Trailing class-level attributes carry nothing we execute.

        Ok(JVMClassFile {
            minor_version,
            major_version,
            constant_pool,
            methods,
        })
    }

    fn parse_constant_pool(cursor: &mut Cursor<&[u8]>) -> Result<Vec<CPInfo>> {
        let constant_pool_count = cursor.read_u16::<BigEndian>()?;
        let mut pool = Vec::with_capacity(constant_pool_count as usize);
        // Slot 0 is unused by the format.
        pool.push(CPInfo::Unsupported { tag: 0 });
        let mut index = 1;
        while index < constant_pool_count {
            let tag = cursor.read_u8()?;
            let info = match tag {
                // CONSTANT_Utf8
                1 => {
                    let length = cursor.read_u16::<BigEndian>()?;
                    let mut buffer = vec![0u8; length as usize];
                    cursor.read_exact(&mut buffer)?;
                    let bytes = String::from_utf8(buffer)
                        .map_err(|_| ParseError::MalformedUtf8)?;
                    CPInfo::ConstantUtf8 { bytes }
                }
                // CONSTANT_Integer
                3 => CPInfo::ConstantInteger {
                    bytes: cursor.read_i32::<BigEndian>()?,
                },
                // CONSTANT_Float
                4 => {
                    cursor.seek(SeekFrom::Current(4))?;
                    CPInfo::Unsupported { tag }
                }
                // CONSTANT_Long and CONSTANT_Double take two pool slots.
                5 | 6 => {
                    cursor.seek(SeekFrom::Current(8))?;
                    pool.push(CPInfo::Unsupported { tag });
                    index += 1;
                    CPInfo::Unsupported { tag }
                }
                // CONSTANT_Class
                7 => CPInfo::ConstantClass {
                    name_index: cursor.read_u16::<BigEndian>()?,
                },
                // CONSTANT_String
                8 => CPInfo::ConstantString {
                    string_index: cursor.read_u16::<BigEndian>()?,
                },
                // CONSTANT_Fieldref
                9 => CPInfo::ConstantFieldRef {
                    class_index: cursor.read_u16::<BigEndian>()?,
                    name_and_type_index: cursor.read_u16::<BigEndian>()?,
                },
                // CONSTANT_Methodref
                10 => CPInfo::ConstantMethodRef {
                    class_index: cursor.read_u16::<BigEndian>()?,
                    name_and_type_index: cursor.read_u16::<BigEndian>()?,
                },
                // CONSTANT_InterfaceMethodref
                11 => CPInfo::ConstantInterfaceMethodRef {
                    class_index: cursor.read_u16::<BigEndian>()?,
                    name_and_type_index: cursor.read_u16::<BigEndian>()?,
                },
                // CONSTANT_NameAndType
                12 => CPInfo::ConstantNameAndType {
                    name_index: cursor.read_u16::<BigEndian>()?,
                    descriptor_index: cursor.read_u16::<BigEndian>()?,
                },
                // CONSTANT_MethodHandle
                15 => {
                    cursor.seek(SeekFrom::Current(3))?;
                    CPInfo::Unsupported { tag }
                }
                // CONSTANT_MethodType
                16 => {
                    cursor.seek(SeekFrom::Current(2))?;
                    CPInfo::Unsupported { tag }
                }
                // CONSTANT_Dynamic and CONSTANT_InvokeDynamic
                17 | 18 => {
                    cursor.seek(SeekFrom::Current(4))?;
                    CPInfo::Unsupported { tag }
                }
                _ => return Err(ParseError::UnsupportedConstantTag(tag)),
            };
            pool.push(info);
            index += 1;
        }
        Ok(pool)
    }

    fn parse_method(
        cursor: &mut Cursor<&[u8]>,
        pool: &[CPInfo],
    ) -> Result<MethodInfo> {
        let access_flags = cursor.read_u16::<BigEndian>()?;
        let name_index = cursor.read_u16::<BigEndian>()?;
        let descriptor_index = cursor.read_u16::<BigEndian>()?;
        let attributes_count = cursor.read_u16::<BigEndian>()?;

        let mut attributes = HashMap::new();
        for _ in 0..attributes_count {
            let attribute_name_index = cursor.read_u16::<BigEndian>()?;
            let attribute_length = cursor.read_u32::<BigEndian>()?;
            let name = match pool.get(attribute_name_index as usize) {
                Some(CPInfo::ConstantUtf8 { bytes }) => bytes.clone(),
                _ => {
                    return Err(ParseError::InvalidConstantReference(
                        attribute_name_index,
                    ))
                }
            };
            if name == "Code" {
                let max_stack = cursor.read_u16::<BigEndian>()?;
                let max_locals = cursor.read_u16::<BigEndian>()?;
                let code_length = cursor.read_u32::<BigEndian>()?;
                let mut code = vec![0u8; code_length as usize];
                cursor.read_exact(&mut code)?;
                let exception_table_length = cursor.read_u16::<BigEndian>()?;
                cursor.seek(SeekFrom::Current(
                    i64::from(exception_table_length) * 8,
                ))?;
                let code_attributes_count = cursor.read_u16::<BigEndian>()?;
                Self::skip_attributes(cursor, code_attributes_count)?;
                attributes.insert(
                    name,
                    AttributeInfo::CodeAttribute {
                        max_stack,
                        max_locals,
                        code,
                    },
                );
            } else {
                cursor.seek(SeekFrom::Current(i64::from(attribute_length)))?;
            }
        }

        Ok(MethodInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    fn skip_attributes(cursor: &mut Cursor<&[u8]>, count: u16) -> Result<()> {
        for _ in 0..count {
            // attribute_name_index.
            cursor.seek(SeekFrom::Current(2))?;
            let attribute_length = cursor.read_u32::<BigEndian>()?;
            cursor.seek(SeekFrom::Current(i64::from(attribute_length)))?;
        }
        Ok(())
    }
}

// Hand-assembles the smallest class file the parser accepts: one
// static method `main([Ljava/lang/String;)V` whose body is a lone
// `return`, plus an Integer constant.
#[cfg(test)]
pub(crate) fn minimal_class_file() -> Vec<u8> {
    use byteorder::WriteBytesExt;

    let mut out = Vec::new();
    out.write_u32::<BigEndian>(0xCAFE_BABE).unwrap();
    out.write_u16::<BigEndian>(0).unwrap(); // minor
    out.write_u16::<BigEndian>(55).unwrap(); // major

    // Constant pool: 4 entries, count field is entries + 1.
    out.write_u16::<BigEndian>(5).unwrap();
    for utf8 in ["main", "([Ljava/lang/String;)V", "Code"] {
        out.write_u8(1).unwrap();
        out.write_u16::<BigEndian>(utf8.len() as u16).unwrap();
        out.extend_from_slice(utf8.as_bytes());
    }
    out.write_u8(3).unwrap();
    out.write_i32::<BigEndian>(1234).unwrap();

    out.write_u16::<BigEndian>(0x0021).unwrap(); // access_flags
    out.write_u16::<BigEndian>(0).unwrap(); // this_class
    out.write_u16::<BigEndian>(0).unwrap(); // super_class
    out.write_u16::<BigEndian>(0).unwrap(); // interfaces_count
    out.write_u16::<BigEndian>(0).unwrap(); // fields_count

    // One method with one Code attribute.
    out.write_u16::<BigEndian>(1).unwrap();
    out.write_u16::<BigEndian>(0x0009).unwrap(); // ACC_PUBLIC | ACC_STATIC
    out.write_u16::<BigEndian>(1).unwrap(); // name_index -> "main"
    out.write_u16::<BigEndian>(2).unwrap(); // descriptor_index
    out.write_u16::<BigEndian>(1).unwrap(); // attributes_count
    out.write_u16::<BigEndian>(3).unwrap(); // -> "Code"
    let code = [0xb1u8]; // return
    out.write_u32::<BigEndian>(12 + code.len() as u32).unwrap();
    out.write_u16::<BigEndian>(1).unwrap(); // max_stack
    out.write_u16::<BigEndian>(1).unwrap(); // max_locals
    out.write_u32::<BigEndian>(code.len() as u32).unwrap();
    out.extend_from_slice(&code);
    out.write_u16::<BigEndian>(0).unwrap(); // exception_table_length
    out.write_u16::<BigEndian>(0).unwrap(); // code attributes_count

    out.write_u16::<BigEndian>(0).unwrap(); // class attributes_count
    out
}
