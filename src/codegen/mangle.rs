//! Target identifiers for every generated entity.
//!
//! Path segments join with `__`, and so do the parts of an instance name
//! (`Array__Int`). Hyphens inside source identifiers also become `__`, which
//! is why collisions have to be checked rather than ruled out.

use std::collections::HashMap;

use crate::{
    codegen::Error,
    ir::FnRef,
    types::{mangle_segment, well_known, Type},
    util::intern::{Interner, Symbol},
};

pub const ALLOCATE: &str = "_specs__Allocate";
pub const USER_MAIN: &str = "_specs__UserMain";
pub const TYPE_ID: &str = "_specs__TypeID";
pub const NUMERIC_ITERATOR: &str = "_Specs_NumericIterator";

pub struct Mangler<'a> {
    idents: &'a Interner<str>,
    nested_prefix: &'a str,
}

impl<'a> Mangler<'a> {
    pub fn new(idents: &'a Interner<str>, nested_prefix: &'a str) -> Mangler<'a> {
        Mangler {
            idents,
            nested_prefix,
        }
    }

    pub fn ident(&self, name: Symbol) -> String {
        mangle_segment(self.idents.get(name))
    }

    /// The type name, as used in `typedef`s.
    pub fn type_name(&self, ty: &Type) -> String {
        ty.mangled(self.idents)
    }

    /// The type of a value of `ty` in generated code.
    pub fn c_type(&self, ty: &Type) -> String {
        match ty {
            Type::Int => "int".to_string(),
            Type::Bool => "bool".to_string(),
            Type::String => "char*".to_string(),
            Type::Void => "void".to_string(),
            Type::Range => NUMERIC_ITERATOR.to_string(),
            Type::Interface(_) | Type::Enum(_) => self.type_name(ty),
            Type::Generic(template, _) if *template == well_known::ARRAY_ITERATOR => {
                self.type_name(ty)
            }
            Type::Struct(_) | Type::Generic(..) => format!("{}*", self.type_name(ty)),
            Type::Param(_) => unreachable!("type parameters never reach code generation"),
        }
    }

    pub fn function(&self, target: &FnRef) -> String {
        match target {
            FnRef::Free(path) => {
                let joined = path
                    .segments()
                    .iter()
                    .map(|segment| self.ident(*segment))
                    .collect::<Vec<_>>()
                    .join("__");
                if path.len() > 1 {
                    format!("{}{joined}", self.nested_prefix)
                } else {
                    joined
                }
            }
            FnRef::Method { owner, name } => {
                format!("{}__{}", self.type_name(owner), self.ident(*name))
            }
            FnRef::Impl {
                owner,
                interface,
                name,
            } => format!(
                "{}__{}__{}",
                self.type_name(owner),
                self.ident(*interface),
                self.ident(*name)
            ),
            FnRef::Constructor(ty) => format!("{}__New", self.type_name(ty)),
            FnRef::Array { elem, op } => {
                format!("{}__{}", self.array(elem), op.name())
            }
            FnRef::Range => format!("{NUMERIC_ITERATOR}__New"),
        }
    }

    pub fn array(&self, elem: &Type) -> String {
        format!("Array__{}", elem.mangled(self.idents))
    }

    pub fn array_iterator(&self, elem: &Type) -> String {
        format!("ArrayIterator__{}", elem.mangled(self.idents))
    }

    pub fn dispatch(&self, interface: Symbol, method: Symbol) -> String {
        format!("{}__{}", self.ident(interface), self.ident(method))
    }

    pub fn upcast(&self, interface: Symbol, ty: &Type) -> String {
        format!("{}__From__{}", self.ident(interface), self.type_name(ty))
    }

    pub fn type_id(&self, ty: &Type) -> String {
        format!("{TYPE_ID}__{}", self.type_name(ty))
    }

    pub fn statics(&self, ty: &Type) -> String {
        format!("{}__static", self.type_name(ty))
    }

    pub fn variant(&self, owner: Symbol, variant: Symbol) -> String {
        format!("{}__{}", self.ident(owner), self.ident(variant))
    }

    /// The scalar standing in for one field of a decomposed parameter.
    pub fn decomposed(&self, param: Symbol, field: Symbol) -> String {
        format!("{}__{}", self.ident(param), self.ident(field))
    }
}

/// Every global symbol of the output, with a description of what produced
/// it.
#[derive(Default)]
pub struct SymbolTable {
    owners: HashMap<String, String>,
}

impl SymbolTable {
    /// Claims `symbol` for `owner`, failing if another entity already did.
    pub fn claim(&mut self, symbol: String, owner: impl Into<String>) -> Result<(), Error> {
        let owner = owner.into();
        if let Some(first) = self.owners.get(&symbol) {
            return Err(Error::MangledNameCollision {
                symbol,
                first: first.clone(),
                second: owner,
            });
        }
        self.owners.insert(symbol, owner);
        Ok(())
    }
}
