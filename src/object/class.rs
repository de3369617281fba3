use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::object::{Closure, Execute};

/// A method attached to a class: its name, the formal parameter names
/// (the receiver is bound separately and is not listed here) and the
/// executable body.
pub struct Method {
    pub name: String,
    pub formal_params: Vec<String>,
    pub body: Box<dyn Execute>,
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("formal_params", &self.formal_params)
            .finish_non_exhaustive()
    }
}

/// An immutable class definition with optional single inheritance.
///
/// Methods are kept sorted by name in descending order so that lookup is a
/// binary search rather than a scan.
#[derive(Debug)]
pub struct Class {
    name: String,
    methods: Vec<Method>,
    parent: Option<Rc<Class>>,
}

impl Class {
    pub fn new(name: String, mut methods: Vec<Method>, parent: Option<Rc<Class>>) -> Class {
        methods.sort_by(|lhs, rhs| rhs.name.cmp(&lhs.name));
        Class {
            name,
            methods,
            parent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `name` from this class or from the closest ancestor that
    /// defines it.
    pub fn get_method(&self, name: &str) -> Option<&Method> {
        match self.methods.binary_search_by(|m| name.cmp(m.name.as_str())) {
            Ok(i) => Some(&self.methods[i]),
            Err(_) => self.parent.as_ref().and_then(|p| p.get_method(name)),
        }
    }
}

/// A user-defined object: a reference to its class plus a mutable field map.
#[derive(Debug)]
pub struct ClassInstance {
    class: Rc<Class>,
    fields: RefCell<Closure>,
}

impl ClassInstance {
    pub fn new(class: Rc<Class>) -> ClassInstance {
        ClassInstance {
            class,
            fields: RefCell::new(Closure::new()),
        }
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    /// A method is callable iff both its name and its formal parameter
    /// count match.
    pub fn has_method(&self, method: &str, argument_count: usize) -> bool {
        self.class
            .get_method(method)
            .map_or(false, |m| m.formal_params.len() == argument_count)
    }

    pub fn fields(&self) -> Ref<'_, Closure> {
        self.fields.borrow()
    }

    pub fn fields_mut(&self) -> RefMut<'_, Closure> {
        self.fields.borrow_mut()
    }
}
