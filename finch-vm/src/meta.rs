//! The read-only metadata view.
//!
//! A [`Suite`] holds every class and method an external loader produced.
//! It is immutable during execution and shared across guest threads without
//! locking.

use bitflags::bitflags;
use nonmax::NonMaxU16;

use finch_bytecode::opcode::AccessKind;

use crate::fault::FaultKind;
use crate::value::Word;

/// A class number. Class references on the operand stack are class numbers
/// widened to a word.
pub type ClassId = u16;

/// A method id, indexing [`Suite::methods`].
pub type MethodId = u16;

bitflags! {
    /// Class access flags.
    pub struct ClassFlags: u16 {
        const INTERFACE = 0x0001;
        const FINAL     = 0x0002;
        const ABSTRACT  = 0x0004;
    }
}

bitflags! {
    /// Method access flags.
    pub struct MethodFlags: u16 {
        const STATIC = 0x0001;
        const INIT   = 0x0002;
    }
}

/// Declared kind of an instance or static field. Every field occupies one
/// word; sub-word kinds are normalized on write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Byte,
    Short,
    Char,
    Int,
    Ref,
}

impl FieldKind {
    /// Normalize a word for storage in a field of this kind.
    pub fn normalize(self, v: Word) -> Word {
        match self {
            FieldKind::Byte => v as i8 as Word,
            FieldKind::Short => v as i16 as Word,
            FieldKind::Char => v as u16 as Word,
            FieldKind::Int | FieldKind::Ref => v,
        }
    }

    /// Whether a field access opcode form may touch this kind. The untyped
    /// form works on any single-word field; typed forms must match exactly.
    pub fn admits(self, access: AccessKind) -> bool {
        match access {
            AccessKind::Word => true,
            AccessKind::Byte => self == FieldKind::Byte,
            AccessKind::Short => self == FieldKind::Short,
            AccessKind::Char => self == FieldKind::Char,
            AccessKind::Int => self == FieldKind::Int,
            AccessKind::Ref => self == FieldKind::Ref,
        }
    }
}

/// Element kind of an array class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayElem {
    Byte,
    Short,
    Char,
    Int,
    /// Two words per element.
    Long,
    /// References to instances or arrays of the named class.
    Ref(ClassId),
}

/// An interned constant object, owned by a class. Interned into the heap
/// when the VM is constructed; `object_n`/`object` push the handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstObject {
    /// Interned as a `char` array of UTF-16 units.
    Str(String),
    Bytes(Vec<i8>),
    Shorts(Vec<i16>),
    Chars(Vec<u16>),
    Ints(Vec<i32>),
    Longs(Vec<i64>),
}

/// One entry of a method's exception handler table.
///
/// A guest-catchable fault at `pc` in `start..end` whose code matches
/// `kind` transfers control to `target` with the operand stack cleared to
/// the single pushed fault code. `kind` 0 catches every code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Handler {
    pub start: u16,
    pub end: u16,
    pub target: u16,
    pub kind: Word,
}

impl Handler {
    /// Whether this entry catches `code` raised at `pc`.
    pub fn covers(&self, pc: usize, code: Word) -> bool {
        (self.start as usize..self.end as usize).contains(&pc)
            && (self.kind == 0 || self.kind == code)
    }
}

/// Everything the interpreter needs to know about one method.
#[derive(Clone, Debug)]
pub struct MethodMeta {
    pub code: Vec<u8>,
    /// Incoming argument words, bound to the lowest local slots.
    pub param_words: u8,
    /// Total local words, including the parameters.
    pub local_words: u16,
    /// Result words: 0, 1 or 2.
    pub return_words: u8,
    pub handlers: Vec<Handler>,
    pub flags: MethodFlags,
}

impl MethodMeta {
    /// A method with `code`, taking `param_words` and returning
    /// `return_words`. Extra locals default to none.
    pub fn new(code: Vec<u8>, param_words: u8, return_words: u8) -> Self {
        MethodMeta {
            code,
            param_words,
            local_words: param_words as u16,
            return_words,
            handlers: Vec::new(),
            flags: MethodFlags::empty(),
        }
    }

    pub fn with_locals(mut self, local_words: u16) -> Self {
        self.local_words = local_words;
        self
    }

    pub fn with_handler(mut self, h: Handler) -> Self {
        self.handlers.push(h);
        self
    }

    pub fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Everything the interpreter needs to know about one class.
#[derive(Clone, Debug)]
pub struct ClassMeta {
    pub name: String,
    pub flags: ClassFlags,
    /// Superclass link; `None` for a root class.
    pub super_class: Option<NonMaxU16>,
    /// Targets of `class_n`/`class`.
    pub class_refs: Vec<ClassId>,
    /// Targets of `object_n`/`object`.
    pub const_objects: Vec<ConstObject>,
    /// Interfaces this class implements, with their slot remap tables.
    pub interfaces: Vec<InterfaceImpl>,
    /// Virtual slot of the first entry of `virtual_methods`; lower slots
    /// resolve in a superclass.
    pub first_virtual_slot: u16,
    pub virtual_methods: Vec<MethodId>,
    pub static_methods: Vec<MethodId>,
    /// Declared instance field layout, one word per entry.
    pub instance_fields: Vec<FieldKind>,
    /// Declared static field layout, zero-initialized per VM.
    pub static_fields: Vec<FieldKind>,
    /// Element kind, for array classes.
    pub array_element: Option<ArrayElem>,
}

/// An implemented interface: the interface's class number and the table
/// mapping interface slots to virtual slots of the implementing class.
#[derive(Clone, Debug)]
pub struct InterfaceImpl {
    pub itype: ClassId,
    pub slots: Vec<u16>,
}

impl ClassMeta {
    pub fn new(name: impl Into<String>) -> Self {
        ClassMeta {
            name: name.into(),
            flags: ClassFlags::empty(),
            super_class: None,
            class_refs: Vec::new(),
            const_objects: Vec::new(),
            interfaces: Vec::new(),
            first_virtual_slot: 0,
            virtual_methods: Vec::new(),
            static_methods: Vec::new(),
            instance_fields: Vec::new(),
            static_fields: Vec::new(),
            array_element: None,
        }
    }

    /// The superclass number, if any.
    pub fn super_id(&self) -> Option<ClassId> {
        self.super_class.map(|s| s.get())
    }
}

/// The loaded class and method set. Shared read-only across guest threads.
#[derive(Debug, Default)]
pub struct Suite {
    pub classes: Vec<ClassMeta>,
    pub methods: Vec<MethodMeta>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_class(&mut self, class: ClassMeta) -> ClassId {
        self.classes.push(class);
        (self.classes.len() - 1) as ClassId
    }

    pub fn push_method(&mut self, method: MethodMeta) -> MethodId {
        self.methods.push(method);
        (self.methods.len() - 1) as MethodId
    }

    /// Metadata for a class number.
    pub fn class_meta(&self, id: ClassId) -> Result<&ClassMeta, FaultKind> {
        self.classes
            .get(id as usize)
            .ok_or(FaultKind::BadClassRef(id as Word))
    }

    /// Metadata for a class reference popped off the operand stack.
    pub fn class_by_word(&self, word: Word) -> Result<(ClassId, &ClassMeta), FaultKind> {
        let id = ClassId::try_from(word).map_err(|_| FaultKind::BadClassRef(word))?;
        Ok((id, self.class_meta(id)?))
    }

    /// Metadata for a method id.
    pub fn method_meta(&self, id: MethodId) -> Result<&MethodMeta, FaultKind> {
        self.methods
            .get(id as usize)
            .ok_or(FaultKind::BadMethodSlot(id as u32))
    }

    /// Resolve a virtual slot starting at `class`, walking superclasses
    /// while the slot is below the class's first defined slot. Returns the
    /// declaring class and the method.
    pub fn resolve_virtual(
        &self,
        class: ClassId,
        slot: u16,
    ) -> Result<(ClassId, MethodId), FaultKind> {
        let mut current = class;
        loop {
            let meta = self.class_meta(current)?;
            if slot >= meta.first_virtual_slot {
                let i = (slot - meta.first_virtual_slot) as usize;
                return meta
                    .virtual_methods
                    .get(i)
                    .map(|&m| (current, m))
                    .ok_or(FaultKind::BadMethodSlot(slot as u32));
            }
            current = match meta.super_id() {
                Some(s) => s,
                None => return Err(FaultKind::BadMethodSlot(slot as u32)),
            };
        }
    }

    /// Remap an interface slot to a virtual slot of `class`, searching the
    /// class and its superclasses for the interface.
    pub fn remap_interface_slot(
        &self,
        class: ClassId,
        itype: ClassId,
        slot: u16,
    ) -> Result<u16, FaultKind> {
        let mut current = Some(class);
        while let Some(id) = current {
            let meta = self.class_meta(id)?;
            for imp in &meta.interfaces {
                if imp.itype == itype {
                    return imp
                        .slots
                        .get(slot as usize)
                        .copied()
                        .ok_or(FaultKind::BadMethodSlot(slot as u32));
                }
            }
            current = meta.super_id();
        }
        Err(FaultKind::MissingInterface(itype as Word))
    }
}
