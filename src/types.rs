use std::collections::HashMap;

use crate::util::intern::{Interner, Symbol};

/// Nesting limit for template arguments, which stops self-expanding
/// instantiations such as a field of type `Node<Node<T>>` inside `Node<T>`.
pub const MAX_INSTANCE_DEPTH: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Bool,
    String,
    Void,
    Struct(Symbol),
    Interface(Symbol),
    Enum(Symbol),
    /// A template applied to a concrete argument, such as `Array<Int>`.
    Generic(Symbol, Box<Type>),
    /// The numeric iterator built by `Range`.
    Range,
    /// The type parameter of a template. Only found in template layouts and
    /// signatures, never in checked code.
    Param(Symbol),
}

impl Type {
    /// Whether values of this type have a declared field layout, which makes
    /// them eligible for parameter decomposition.
    pub fn is_record(&self) -> bool {
        match self {
            Type::Struct(_) => true,
            Type::Generic(template, _) => !well_known::is_builtin_template(*template),
            _ => false,
        }
    }

    /// The element type if this is `Array<T>`.
    pub fn array_element(&self) -> Option<&Type> {
        match self {
            Type::Generic(template, arg) if *template == well_known::ARRAY => Some(arg),
            _ => None,
        }
    }

    /// The element type if this is `ArrayIterator<T>`.
    pub fn iterator_element(&self) -> Option<&Type> {
        match self {
            Type::Generic(template, arg) if *template == well_known::ARRAY_ITERATOR => Some(arg),
            _ => None,
        }
    }

    pub fn has_param(&self) -> bool {
        match self {
            Type::Param(_) => true,
            Type::Generic(_, arg) => arg.has_param(),
            _ => false,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Type::Generic(_, arg) => 1 + arg.depth(),
            _ => 0,
        }
    }

    /// Human readable rendering, as written in source.
    pub fn show(&self, idents: &Interner<str>) -> String {
        match self {
            Type::Int => "int".into(),
            Type::Bool => "bool".into(),
            Type::String => "string".into(),
            Type::Void => "void".into(),
            Type::Range => "Range".into(),
            Type::Struct(name) | Type::Interface(name) | Type::Enum(name) | Type::Param(name) => {
                idents.get(name).to_string()
            }
            Type::Generic(template, arg) => {
                format!("{}<{}>", idents.get(template), arg.show(idents))
            }
        }
    }

    /// The identifier form used in generated symbols, such as `Array__Int`.
    pub fn mangled(&self, idents: &Interner<str>) -> String {
        match self {
            Type::Int => "Int".into(),
            Type::Bool => "Bool".into(),
            Type::String => "String".into(),
            Type::Void => "Void".into(),
            Type::Range => "Range".into(),
            Type::Struct(name) | Type::Interface(name) | Type::Enum(name) | Type::Param(name) => {
                mangle_segment(idents.get(name))
            }
            Type::Generic(template, arg) => {
                format!(
                    "{}__{}",
                    mangle_segment(idents.get(template)),
                    arg.mangled(idents)
                )
            }
        }
    }
}

/// Maps a built-in type spelling to its type. Both the lower-case and the
/// capitalised spelling are accepted.
pub fn primitive(name: &str) -> Option<Type> {
    let ty = match name {
        "int" | "Int" => Type::Int,
        "bool" | "Bool" => Type::Bool,
        "string" | "String" => Type::String,
        "void" | "Void" => Type::Void,
        "Range" => Type::Range,
        _ => return None,
    };
    Some(ty)
}

/// Rewrites a source identifier into a target identifier. Interior hyphens
/// become double underscores.
pub fn mangle_segment(name: &str) -> String {
    name.replace('-', "__")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FnSig {
    pub params: Vec<Type>,
    pub ret: Type,
}

/// Ordered field layout of a struct. Declared order is the memory order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructLayout {
    pub fields: Vec<(Symbol, Type)>,
}

impl StructLayout {
    pub fn get(&self, name: Symbol) -> Option<&Type> {
        self.fields
            .iter()
            .find_map(|(field, ty)| (*field == name).then_some(ty))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeDecl {
    Struct,
    /// A generic struct with one type parameter.
    Template { param: Symbol },
    Interface,
    Enum { variants: Vec<Symbol> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodInfo {
    pub sig: FnSig,
    /// Instance methods take the receiver as their first (implicit) argument.
    pub receiver: bool,
}

#[derive(Clone, Debug, Default)]
pub struct StructInfo {
    pub layout: StructLayout,
    pub statics: StructLayout,
    pub methods: HashMap<Symbol, MethodInfo>,
    /// Implemented interfaces, in `impl` declaration order.
    pub implements: Vec<Symbol>,
}

/// An interface's method set plus every concrete type that declared an
/// implementation of it.
#[derive(Clone, Debug, Default)]
pub struct InterfaceInfo {
    pub methods: Vec<(Symbol, FnSig)>,
    pub implementors: Vec<Type>,
}

impl InterfaceInfo {
    pub fn method(&self, name: Symbol) -> Option<&FnSig> {
        self.methods
            .iter()
            .find_map(|(method, sig)| (*method == name).then_some(sig))
    }
}

/// How a method name resolved on a concrete struct type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MethodLookup {
    Own(MethodInfo),
    Interface { interface: Symbol, sig: FnSig },
    Ambiguous(Vec<Symbol>),
    Missing,
}

pub struct TypeRegistry {
    decls: HashMap<Symbol, TypeDecl>,
    structs: HashMap<Type, StructInfo>,
    interfaces: HashMap<Symbol, InterfaceInfo>,
}

impl TypeRegistry {
    pub fn with_capacity(capacity: usize) -> TypeRegistry {
        TypeRegistry {
            decls: HashMap::with_capacity(capacity),
            structs: HashMap::with_capacity(capacity),
            interfaces: HashMap::with_capacity(capacity),
        }
    }

    /// Attempts to declare the provided top-level type name.
    ///
    /// Fails if the name is already declared.
    pub fn declare(&mut self, name: Symbol, decl: TypeDecl) -> Result<(), ()> {
        if self.decls.contains_key(&name) {
            return Err(());
        }
        self.decls.insert(name, decl);
        Ok(())
    }

    pub fn decl(&self, name: Symbol) -> Option<&TypeDecl> {
        self.decls.get(&name)
    }

    pub fn define_struct(&mut self, ty: Type, info: StructInfo) {
        self.structs.insert(ty, info);
    }

    pub fn struct_info(&self, ty: &Type) -> Option<&StructInfo> {
        self.structs.get(ty)
    }

    pub fn struct_info_mut(&mut self, ty: &Type) -> Option<&mut StructInfo> {
        self.structs.get_mut(ty)
    }

    pub fn define_interface(&mut self, name: Symbol, info: InterfaceInfo) {
        self.interfaces.insert(name, info);
    }

    pub fn interface(&self, name: Symbol) -> Option<&InterfaceInfo> {
        self.interfaces.get(&name)
    }

    pub fn interface_mut(&mut self, name: Symbol) -> Option<&mut InterfaceInfo> {
        self.interfaces.get_mut(&name)
    }

    /// Interface membership is only ever declared through `impl`.
    pub fn implements(&self, ty: &Type, interface: Symbol) -> bool {
        self.structs
            .get(ty)
            .is_some_and(|info| info.implements.contains(&interface))
    }

    /// Looks a method up on a concrete struct type: own methods first, then
    /// the methods of every implemented interface.
    pub fn lookup_method(&self, ty: &Type, name: Symbol) -> MethodLookup {
        let Some(info) = self.structs.get(ty) else {
            return MethodLookup::Missing;
        };
        if let Some(method) = info.methods.get(&name) {
            return MethodLookup::Own(method.clone());
        }

        let candidates: Vec<(Symbol, &FnSig)> = info
            .implements
            .iter()
            .filter_map(|&interface| {
                let sig = self.interfaces.get(&interface)?.method(name)?;
                Some((interface, sig))
            })
            .collect();
        match candidates.as_slice() {
            [] => MethodLookup::Missing,
            [(interface, sig), rest @ ..] if rest.iter().all(|(_, other)| other == sig) => {
                MethodLookup::Interface {
                    interface: *interface,
                    sig: (*sig).clone(),
                }
            }
            _ => MethodLookup::Ambiguous(candidates.iter().map(|(i, _)| *i).collect()),
        }
    }
}

pub mod well_known {
    use crate::util::intern::{Interned, Interner, Symbol};

    pub const SELF: Symbol = Interned::nth(1);
    pub const NEW: Symbol = Interned::nth(2);
    pub const ARRAY: Symbol = Interned::nth(3);
    pub const ARRAY_ITERATOR: Symbol = Interned::nth(4);
    pub const RANGE: Symbol = Interned::nth(5);
    pub const LENGTH: Symbol = Interned::nth(6);
    pub const GET: Symbol = Interned::nth(7);
    pub const SET: Symbol = Interned::nth(8);
    pub const ITERATE: Symbol = Interned::nth(9);
    pub const REVERSED: Symbol = Interned::nth(10);

    pub const ALL: &[(Symbol, &str)] = &[
        (SELF, "self"),
        (NEW, "New"),
        (ARRAY, "Array"),
        (ARRAY_ITERATOR, "ArrayIterator"),
        (RANGE, "Range"),
        (LENGTH, "Length"),
        (GET, "Get"),
        (SET, "Set"),
        (ITERATE, "Iterate"),
        (REVERSED, "Reversed"),
    ];

    /// Registers the well-known names on a fresh interner.
    pub fn register(idents: &mut Interner<str>) {
        if !idents.is_empty() {
            return;
        }
        for &(expected, name) in ALL {
            let handle = idents.intern(name);
            assert_eq!(handle, expected, "well-known name {name} out of order");
        }
    }

    pub fn is_builtin_template(name: Symbol) -> bool {
        name == ARRAY || name == ARRAY_ITERATOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::intern::Interner;

    fn sig(params: Vec<Type>, ret: Type) -> FnSig {
        FnSig { params, ret }
    }

    #[test]
    fn mangled_instance_names() {
        let mut i = Interner::with_capacity(16);
        well_known::register(&mut i);
        let pair = i.intern("Pair");
        let point = i.intern("Grid-Point");

        let array_int = Type::Generic(well_known::ARRAY, Box::new(Type::Int));
        assert_eq!(array_int.mangled(&i), "Array__Int");
        assert_eq!(array_int.show(&i), "Array<int>");

        let nested = Type::Generic(pair, Box::new(Type::Struct(point)));
        assert_eq!(nested.mangled(&i), "Pair__Grid__Point");
        assert_eq!(nested.depth(), 1);
        assert!(nested.is_record());
        assert!(!array_int.is_record());
    }

    #[test]
    fn lookup_method_prefers_own_then_interfaces() {
        let i = &mut Interner::with_capacity(16);
        well_known::register(i);
        let dog = Type::Struct(i.intern("Dog"));
        let animal = i.intern("Animal");
        let pet = i.intern("Pet");
        let name = i.intern("Name");
        let bark = i.intern("Bark");
        let species = i.intern("Species");

        let reg = &mut TypeRegistry::with_capacity(4);
        reg.define_interface(
            animal,
            InterfaceInfo {
                methods: vec![
                    (species, sig(vec![], Type::String)),
                    (name, sig(vec![], Type::String)),
                ],
                implementors: vec![dog.clone()],
            },
        );
        reg.define_interface(
            pet,
            InterfaceInfo {
                methods: vec![(name, sig(vec![Type::Int], Type::String))],
                implementors: vec![dog.clone()],
            },
        );
        let mut info = StructInfo {
            implements: vec![animal, pet],
            ..StructInfo::default()
        };
        info.methods.insert(
            bark,
            MethodInfo {
                sig: sig(vec![], Type::Void),
                receiver: true,
            },
        );
        reg.define_struct(dog.clone(), info);

        assert!(matches!(reg.lookup_method(&dog, bark), MethodLookup::Own(_)));
        assert_eq!(
            reg.lookup_method(&dog, species),
            MethodLookup::Interface {
                interface: animal,
                sig: sig(vec![], Type::String)
            }
        );
        assert_eq!(
            reg.lookup_method(&dog, name),
            MethodLookup::Ambiguous(vec![animal, pet])
        );
        assert_eq!(reg.lookup_method(&dog, i.intern("Fly")), MethodLookup::Missing);
        assert!(reg.implements(&dog, pet));
    }

    #[test]
    fn declare_rejects_duplicates() {
        let i = &mut Interner::with_capacity(4);
        let reg = &mut TypeRegistry::with_capacity(4);
        let foo = i.intern("Foo");
        assert!(reg.declare(foo, TypeDecl::Struct).is_ok());
        assert!(reg.declare(foo, TypeDecl::Interface).is_err());
        assert_eq!(reg.decl(foo), Some(&TypeDecl::Struct));
    }
}
