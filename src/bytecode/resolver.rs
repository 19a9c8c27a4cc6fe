//! # Method Resolver (external collaborator boundary)
//!
//! Resolving a method identifier to its opcode vector is explicitly out of
//! scope for the core — it is the job of whatever decodes a class file (or,
//! here, a decompiled-class JSON document) into opcodes. [`MethodResolver`]
//! is that boundary; [`JsonResolver`] is one concrete adapter, reading the
//! same per-class JSON layout read by
//! `original_source/solutions/interpreter.py` and `syntactic_analyzer.py`
//! (`methods[].code.bytecode`, each record a `{"opr": ..., ...}` dict).
//! [`InMemoryResolver`] is a `HashMap`-backed stand-in for tests.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value as Json;

use crate::bytecode::instr::{BinOp, Cond, Instr, Kind};
use crate::method::MethodId;
use crate::value::Value;

#[derive(Debug)]
pub enum ResolverError {
    UnknownMethod(MethodId),
    Io(String),
    Malformed(String),
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverError::UnknownMethod(m) => write!(f, "unknown method: {}", m),
            ResolverError::Io(msg) => write!(f, "resolver I/O error: {}", msg),
            ResolverError::Malformed(msg) => write!(f, "malformed bytecode record: {}", msg),
        }
    }
}

impl std::error::Error for ResolverError {}

pub trait MethodResolver {
    fn resolve(&self, method: &MethodId) -> Result<Vec<Instr>, ResolverError>;
}

/// `HashMap`-backed resolver for unit tests: no JSON, no filesystem.
#[derive(Default)]
pub struct InMemoryResolver {
    methods: HashMap<MethodId, Vec<Instr>>,
}

impl InMemoryResolver {
    pub fn new() -> Self {
        InMemoryResolver {
            methods: HashMap::new(),
        }
    }

    pub fn insert(&mut self, method: MethodId, code: Vec<Instr>) {
        self.methods.insert(method, code);
    }
}

impl MethodResolver for InMemoryResolver {
    fn resolve(&self, method: &MethodId) -> Result<Vec<Instr>, ResolverError> {
        self.methods
            .get(method)
            .cloned()
            .ok_or_else(|| ResolverError::UnknownMethod(method.clone()))
    }
}

/// Reads `<root>/<package/path>/<Class>.json`, decoding each
/// `methods[].code.bytecode` record into an [`Instr`].
pub struct JsonResolver {
    root: PathBuf,
}

impl JsonResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        JsonResolver { root: root.into() }
    }

    fn class_file(&self, method: &MethodId) -> PathBuf {
        let rel = method.class_name.replace('.', "/");
        self.root.join(format!("{}.json", rel))
    }
}

impl MethodResolver for JsonResolver {
    fn resolve(&self, method: &MethodId) -> Result<Vec<Instr>, ResolverError> {
        let path = self.class_file(method);
        let text = fs::read_to_string(&path)
            .map_err(|e| ResolverError::Io(format!("{}: {}", path.display(), e)))?;
        let doc: Json = serde_json::from_str(&text)
            .map_err(|e| ResolverError::Malformed(format!("{}: {}", path.display(), e)))?;

        let methods = doc
            .get("methods")
            .and_then(Json::as_array)
            .ok_or_else(|| ResolverError::Malformed("missing \"methods\" array".to_string()))?;

        for m in methods {
            if m.get("name").and_then(Json::as_str) == Some(method.method_name.as_str()) {
                let bytecode = m
                    .pointer("/code/bytecode")
                    .and_then(Json::as_array)
                    .ok_or_else(|| ResolverError::Malformed("missing code.bytecode".to_string()))?;
                return bytecode
                    .iter()
                    .map(decode_record)
                    .collect::<Result<Vec<_>, _>>();
            }
        }
        Err(ResolverError::UnknownMethod(method.clone()))
    }
}

fn decode_record(rec: &Json) -> Result<Instr, ResolverError> {
    let opr = rec
        .get("opr")
        .and_then(Json::as_str)
        .ok_or_else(|| ResolverError::Malformed("record missing \"opr\"".to_string()))?;

    let str_field = |name: &str| -> Result<String, ResolverError> {
        rec.get(name)
            .and_then(Json::as_str)
            .map(str::to_string)
            .ok_or_else(|| ResolverError::Malformed(format!("missing \"{}\"", name)))
    };
    let usize_field = |name: &str| -> Result<usize, ResolverError> {
        rec.get(name)
            .and_then(Json::as_u64)
            .map(|v| v as usize)
            .ok_or_else(|| ResolverError::Malformed(format!("missing \"{}\"", name)))
    };
    let u32_field = |name: &str| -> Result<u32, ResolverError> {
        rec.get(name)
            .and_then(Json::as_u64)
            .map(|v| v as u32)
            .ok_or_else(|| ResolverError::Malformed(format!("missing \"{}\"", name)))
    };
    let i32_field = |name: &str| -> Result<i32, ResolverError> {
        rec.get(name)
            .and_then(Json::as_i64)
            .map(|v| v as i32)
            .ok_or_else(|| ResolverError::Malformed(format!("missing \"{}\"", name)))
    };

    match opr {
        "push" => {
            let value = rec
                .get("value")
                .ok_or_else(|| ResolverError::Malformed("push missing \"value\"".to_string()))?;
            if value.get("type").and_then(Json::as_str) == Some("string") {
                let s = value
                    .get("value")
                    .and_then(Json::as_str)
                    .ok_or_else(|| ResolverError::Malformed("bad string literal".to_string()))?;
                return Ok(Instr::PushString(s.to_string()));
            }
            Ok(Instr::Push(decode_value(value)?))
        }
        "load" => Ok(Instr::Load(decode_kind(&str_field("type")?)?, u32_field("index")?)),
        "store" => Ok(Instr::Store(decode_kind(&str_field("type")?)?, u32_field("index")?)),
        "binary" => Ok(Instr::Binary(
            decode_kind(&str_field("type")?)?,
            decode_binop(&str_field("operant")?)?,
        )),
        "comparefloating" => Ok(Instr::CompareFloating {
            nan_value: i32_field("nan_value")?,
        }),
        "ifz" => Ok(Instr::Ifz(decode_cond(&str_field("condition")?)?, usize_field("target")?)),
        "if" => Ok(Instr::If(decode_cond(&str_field("condition")?)?, usize_field("target")?)),
        "goto" => Ok(Instr::Goto(usize_field("target")?)),
        "incr" => Ok(Instr::Incr(u32_field("index")?, i32_field("amount")?)),
        "cast" => Ok(Instr::CastIntToShort),
        "return" => {
            let kind = match rec.get("type").and_then(Json::as_str) {
                None => Kind::Void,
                Some(t) => decode_kind(t)?,
            };
            Ok(Instr::Return(kind))
        }
        "new" => Ok(Instr::New(str_field("class")?)),
        "dup" => Ok(Instr::Dup),
        "invoke" => {
            let access = str_field("access")?;
            let method_str = str_field("method")?;
            let target = MethodId::parse(&method_str)
                .ok_or_else(|| ResolverError::Malformed(format!("bad method ref {}", method_str)))?;
            match access.as_str() {
                "static" => Ok(Instr::InvokeStatic(target)),
                "special" => Ok(Instr::InvokeSpecial(target)),
                "virtual" => Ok(Instr::InvokeVirtual(target)),
                other => Err(ResolverError::Malformed(format!("unknown invoke access {}", other))),
            }
        }
        "invokedynamic" => Ok(Instr::InvokeDynamic {
            name: str_field("name")?,
            descriptor: str_field("descriptor")?,
        }),
        "get" => Ok(Instr::Get(str_field("field")?)),
        "throw" => Ok(Instr::Throw),
        "newarray" => Ok(Instr::NewArray(decode_kind(&str_field("type")?)?, u32_field("dim").unwrap_or(1))),
        "arraystore" => Ok(Instr::ArrayStore(decode_kind(&str_field("type")?)?)),
        "arrayload" => Ok(Instr::ArrayLoad(decode_kind(&str_field("type")?)?)),
        "arraylength" => Ok(Instr::ArrayLength),
        other => Err(ResolverError::Malformed(format!("unknown opcode {}", other))),
    }
}

fn decode_kind(s: &str) -> Result<Kind, ResolverError> {
    match s {
        "int" => Ok(Kind::Int),
        "float" => Ok(Kind::Float),
        "ref" => Ok(Kind::Reference),
        "char" => Ok(Kind::Char),
        other => Err(ResolverError::Malformed(format!("unknown value kind {}", other))),
    }
}

fn decode_binop(s: &str) -> Result<BinOp, ResolverError> {
    match s {
        "add" => Ok(BinOp::Add),
        "sub" => Ok(BinOp::Sub),
        "mul" => Ok(BinOp::Mul),
        "div" => Ok(BinOp::Div),
        "rem" => Ok(BinOp::Rem),
        other => Err(ResolverError::Malformed(format!("unknown binary operant {}", other))),
    }
}

fn decode_cond(s: &str) -> Result<Cond, ResolverError> {
    match s {
        "eq" => Ok(Cond::Eq),
        "ne" => Ok(Cond::Ne),
        "gt" => Ok(Cond::Gt),
        "ge" => Ok(Cond::Ge),
        "lt" => Ok(Cond::Lt),
        "le" => Ok(Cond::Le),
        "is" => Ok(Cond::Is),
        "isnot" => Ok(Cond::IsNot),
        other => Err(ResolverError::Malformed(format!("unknown condition {}", other))),
    }
}

fn decode_value(v: &Json) -> Result<Value, ResolverError> {
    let ty = v
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| ResolverError::Malformed("push value missing \"type\"".to_string()))?;
    match ty {
        "integer" => Ok(Value::Int(
            v.get("value")
                .and_then(Json::as_i64)
                .ok_or_else(|| ResolverError::Malformed("bad integer literal".to_string()))? as i32,
        )),
        "float" => Ok(Value::Float(
            v.get("value")
                .and_then(Json::as_f64)
                .ok_or_else(|| ResolverError::Malformed("bad float literal".to_string()))?,
        )),
        "boolean" => Ok(Value::Boolean(
            v.get("value")
                .and_then(Json::as_bool)
                .ok_or_else(|| ResolverError::Malformed("bad boolean literal".to_string()))?,
        )),
        other => Err(ResolverError::Malformed(format!(
            "push literal of type {} must be allocated via New/NewArray, not Push",
            other
        ))),
    }
}

/// Locate the decompiled-class JSON directory relative to a working
/// directory, the way `original_source/syntactic_analyzer.py` resolves
/// `target/decompiled/`.
pub fn default_class_root(base: impl AsRef<Path>) -> PathBuf {
    base.as_ref().join("target").join("decompiled")
}
