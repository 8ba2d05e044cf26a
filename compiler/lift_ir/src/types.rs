//! Structurally interned source types.
//!
//! Types are interned once in a [`TypePool`] and referred to everywhere by
//! [`TypeId`]. Two structurally equal types always share an ID, so type
//! equality is ID equality. Named structs carry their name as part of the
//! structure, which keeps them nominal.

use rustc_hash::FxHashMap;

// ── ID newtype ──────────────────────────────────────────────────────

/// Interned type handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    /// Create a type ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ── Types ───────────────────────────────────────────────────────────

/// A source type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    Void,
    /// Integer of arbitrary bit width (`i1` is the boolean type).
    Int { bits: u32 },
    Float,
    Double,
    /// Opaque pointer. Pointee types live on the instructions that use it.
    Ptr,
    Array { element: TypeId, len: u64 },
    Vector { element: TypeId, len: u64 },
    Struct { name: Option<String>, fields: Vec<TypeId> },
    Function { ret: TypeId, params: Vec<TypeId>, variadic: bool },
    Label,
    /// Exception-handling pad token.
    Token,
    Metadata,
}

/// Interning table for [`Type`]s.
#[derive(Clone, Debug, Default)]
pub struct TypePool {
    types: Vec<Type>,
    lookup: FxHashMap<Type, TypeId>,
}

impl TypePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `ty`, returning the existing ID if an equal type is known.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "type counts never exceed u32"
    )]
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.lookup.get(&ty) {
            return id;
        }
        let id = TypeId::new(self.types.len() as u32);
        self.types.push(ty.clone());
        self.lookup.insert(ty, id);
        id
    }

    /// Look up an interned type.
    #[inline]
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // Shorthands

    pub fn void(&mut self) -> TypeId {
        self.intern(Type::Void)
    }

    pub fn int(&mut self, bits: u32) -> TypeId {
        self.intern(Type::Int { bits })
    }

    pub fn float(&mut self) -> TypeId {
        self.intern(Type::Float)
    }

    pub fn double(&mut self) -> TypeId {
        self.intern(Type::Double)
    }

    pub fn ptr(&mut self) -> TypeId {
        self.intern(Type::Ptr)
    }

    pub fn token(&mut self) -> TypeId {
        self.intern(Type::Token)
    }

    pub fn metadata(&mut self) -> TypeId {
        self.intern(Type::Metadata)
    }

    pub fn array(&mut self, element: TypeId, len: u64) -> TypeId {
        self.intern(Type::Array { element, len })
    }

    pub fn vector(&mut self, element: TypeId, len: u64) -> TypeId {
        self.intern(Type::Vector { element, len })
    }

    /// Literal (unnamed) struct.
    pub fn structure(&mut self, fields: Vec<TypeId>) -> TypeId {
        self.intern(Type::Struct { name: None, fields })
    }

    pub fn named_struct(&mut self, name: &str, fields: Vec<TypeId>) -> TypeId {
        self.intern(Type::Struct {
            name: Some(name.to_owned()),
            fields,
        })
    }

    pub fn function(&mut self, ret: TypeId, params: Vec<TypeId>, variadic: bool) -> TypeId {
        self.intern(Type::Function {
            ret,
            params,
            variadic,
        })
    }

    // Queries

    pub fn is_void(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Void)
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.get(id), Type::Ptr)
    }

    /// Bit width if `id` is an integer type.
    pub fn int_bits(&self, id: TypeId) -> Option<u32> {
        match self.get(id) {
            Type::Int { bits } => Some(*bits),
            _ => None,
        }
    }

    /// Return type, parameter types, and variadic flag of a function type.
    pub fn function_parts(&self, id: TypeId) -> Option<(TypeId, &[TypeId], bool)> {
        match self.get(id) {
            Type::Function {
                ret,
                params,
                variadic,
            } => Some((*ret, params, *variadic)),
            _ => None,
        }
    }

    /// Type reached by indexing into an aggregate with one `extractvalue`
    /// style index.
    pub fn member_type(&self, aggregate: TypeId, index: u32) -> Option<TypeId> {
        match self.get(aggregate) {
            Type::Struct { fields, .. } => fields.get(index as usize).copied(),
            Type::Array { element, len } | Type::Vector { element, len } => {
                (u64::from(index) < *len).then_some(*element)
            }
            _ => None,
        }
    }
}
