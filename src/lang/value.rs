use crate::bytecode::instructions::Instructions;
use rustc_hash::{FxHashMap, FxHasher};
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use std::rc::Rc;

/// Runtime value in the Monkey language.
///
/// Values are the only data that can exist on the operand stack, in the
/// globals array or in the constant pool. Strings and composites live behind
/// `Rc` so that the equality opcodes can compare them by identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit signed integer.
    Integer(i64),

    Boolean(bool),

    /// Immutable UTF-8 string.
    String(Rc<str>),

    /// The single null value (not the absence of a value).
    Null,

    /// Array literal value: `[1, 2, 3]`.
    Array(Rc<Vec<Value>>),

    /// Hash literal value: `{"a": 1}`.
    Hash(Rc<HashObject>),

    /// A function body compiled into its own instruction stream.
    Function(Rc<CompiledFunction>),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::String(Rc::from(s))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(items))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Boolean(_) => "BOOLEAN",
            Value::String(_) => "STRING",
            Value::Null => "NULL",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::Function(_) => "COMPILED_FUNCTION",
        }
    }

    /// `false` and `null` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Null => false,
            _ => true,
        }
    }

    /// Derive the key under which this value is stored in a hash, or `None`
    /// if the value cannot be used as a hash key.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Integer(n) => Some(HashKey {
                kind: HashKeyKind::Integer,
                value: *n as u64,
            }),
            Value::Boolean(b) => Some(HashKey {
                kind: HashKeyKind::Boolean,
                value: u64::from(*b),
            }),
            Value::String(s) => {
                let mut hasher = FxHasher::default();
                hasher.write(s.as_bytes());
                Some(HashKey {
                    kind: HashKeyKind::String,
                    value: hasher.finish(),
                })
            }
            _ => None,
        }
    }

    /// Identity comparison used by `OpEqual`/`OpNotEqual` for non-integers.
    ///
    /// Booleans and null are singletons and compare by value. Strings and
    /// composites compare by reference, so two equal-looking arrays built
    /// independently are different objects.
    pub fn is_same_object(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Structural equality, used by tests and tooling. The VM never uses it for
/// the language's `==`, see [`Value::is_same_object`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Hash(a), Value::Hash(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    /// Format a value the way the REPL shows it.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::Null => write!(f, "null"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Hash(hash) => {
                write!(f, "{{")?;
                for (i, pair) in hash.pairs.values().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", pair.key, pair.value)?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "CompiledFunction[{} locals]", func.num_locals),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashKeyKind {
    Integer,
    Boolean,
    String,
}

/// Digest of a hashable value. Integers and booleans map losslessly, strings
/// go through `FxHasher`, so two different strings may share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashKey {
    pub kind: HashKeyKind,
    pub value: u64,
}

/// The original key object kept next to its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HashObject {
    pub pairs: FxHashMap<HashKey, HashPair>,
}

impl HashObject {
    /// Insert `key => value`. Returns `false` when `key` is not hashable.
    pub fn insert(&mut self, key: Value, value: Value) -> bool {
        match key.hash_key() {
            Some(hash_key) => {
                self.pairs.insert(hash_key, HashPair { key, value });
                true
            }
            None => false,
        }
    }

    /// Look up the pair stored for `key`.
    ///
    /// The retained key is compared by content so a digest collision between
    /// two different strings reads as a miss.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        let pair = self.pairs.get(&key.hash_key()?)?;
        match (&pair.key, key) {
            (Value::String(stored), Value::String(wanted)) if stored != wanted => None,
            _ => Some(&pair.value),
        }
    }
}

/// A function literal after compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledFunction {
    pub instructions: Instructions,

    /// Stack slots reserved on call, parameters included.
    pub num_locals: usize,

    pub num_parameters: usize,
}

impl CompiledFunction {
    pub fn new(instructions: Instructions, num_locals: usize, num_parameters: usize) -> Self {
        Self {
            instructions,
            num_locals,
            num_parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_hash_keys_match_by_content() {
        let hello1 = Value::string("Hello World");
        let hello2 = Value::string("Hello World");
        let diff = Value::string("My name is johnny");

        assert_eq!(hello1.hash_key(), hello2.hash_key());
        assert_ne!(hello1.hash_key(), diff.hash_key());
    }

    #[test]
    fn test_integer_and_boolean_keys_do_not_collide() {
        assert_ne!(Value::Integer(1).hash_key(), Value::Boolean(true).hash_key());
        assert_ne!(Value::Integer(0).hash_key(), Value::Boolean(false).hash_key());
    }

    #[test]
    fn test_unhashable_values() {
        assert!(Value::Null.hash_key().is_none());
        assert!(Value::array(vec![]).hash_key().is_none());
        assert!(Value::Hash(Rc::new(HashObject::default())).hash_key().is_none());
    }

    #[test]
    fn test_hash_object_get_checks_retained_key() {
        let mut hash = HashObject::default();
        assert!(hash.insert(Value::string("a"), Value::Integer(1)));

        // Forge a pair whose digest belongs to "b" but whose key is "a".
        let forged_key = Value::string("b").hash_key().unwrap();
        hash.pairs.insert(
            forged_key,
            HashPair {
                key: Value::string("a"),
                value: Value::Integer(2),
            },
        );

        assert_eq!(hash.get(&Value::string("a")), Some(&Value::Integer(1)));
        assert_eq!(hash.get(&Value::string("b")), None);
    }

    #[test]
    fn test_hash_insert_rejects_unhashable() {
        let mut hash = HashObject::default();
        assert!(!hash.insert(Value::Null, Value::Integer(1)));
        assert!(hash.pairs.is_empty());
    }

    #[test]
    fn test_identity_semantics() {
        let a = Value::array(vec![Value::Integer(1)]);
        let b = Value::array(vec![Value::Integer(1)]);

        assert!(a.is_same_object(&a.clone()));
        assert!(!a.is_same_object(&b));
        assert_eq!(a, b);

        let s1 = Value::string("x");
        let s2 = Value::string("x");
        assert!(!s1.is_same_object(&s2));
        assert!(Value::Null.is_same_object(&Value::Null));
        assert!(Value::Boolean(true).is_same_object(&Value::Boolean(true)));
        assert!(!Value::Integer(1).is_same_object(&Value::Boolean(true)));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::string("").is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(
            Value::array(vec![Value::Integer(1), Value::string("two")]).to_string(),
            "[1, two]"
        );

        let mut hash = HashObject::default();
        hash.insert(Value::Integer(1), Value::Boolean(true));
        assert_eq!(Value::Hash(Rc::new(hash)).to_string(), "{1: true}");
    }
}
