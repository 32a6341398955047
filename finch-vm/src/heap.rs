//! The guest heap.
//!
//! Objects are word vectors addressed by opaque handles; arrays carry their
//! element kind. Allocation is zero-initializing and accounted against a
//! word limit; exceeding it is the resource-exhaustion fault, never a
//! panic.

use crate::fault::FaultKind;
use crate::meta::{ArrayElem, ClassId};
use crate::value::{ObjRef, Word, NULL};

/// Backing storage of an array, by element kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArrayData {
    Byte(Vec<i8>),
    Short(Vec<i16>),
    Char(Vec<u16>),
    Int(Vec<i32>),
    Long(Vec<i64>),
    Ref(Vec<ObjRef>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Byte(v) => v.len(),
            ArrayData::Short(v) => v.len(),
            ArrayData::Char(v) => v.len(),
            ArrayData::Int(v) => v.len(),
            ArrayData::Long(v) => v.len(),
            ArrayData::Ref(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn words(&self) -> usize {
        match self {
            ArrayData::Long(v) => v.len() * 2,
            other => other.len(),
        }
    }

    fn zeroed(elem: &ArrayElem, len: usize) -> ArrayData {
        match elem {
            ArrayElem::Byte => ArrayData::Byte(vec![0; len]),
            ArrayElem::Short => ArrayData::Short(vec![0; len]),
            ArrayElem::Char => ArrayData::Char(vec![0; len]),
            ArrayElem::Int => ArrayData::Int(vec![0; len]),
            ArrayElem::Long => ArrayData::Long(vec![0; len]),
            ArrayElem::Ref(_) => ArrayData::Ref(vec![NULL; len]),
        }
    }
}

/// One live heap object.
#[derive(Clone, Debug)]
pub enum HeapObject {
    Instance { class: ClassId, fields: Vec<Word> },
    Array { class: ClassId, data: ArrayData },
}

impl HeapObject {
    pub fn class(&self) -> ClassId {
        match self {
            HeapObject::Instance { class, .. } => *class,
            HeapObject::Array { class, .. } => *class,
        }
    }
}

/// The object store. Handles are indexes offset by one so that 0 stays the
/// null reference.
#[derive(Debug)]
pub struct Heap {
    objects: Vec<HeapObject>,
    limit_words: usize,
    used_words: usize,
}

impl Heap {
    pub fn new(limit_words: usize) -> Self {
        Heap {
            objects: Vec::new(),
            limit_words,
            used_words: 0,
        }
    }

    /// Words currently allocated.
    pub fn used_words(&self) -> usize {
        self.used_words
    }

    fn charge(&mut self, words: usize) -> Result<(), FaultKind> {
        let used = self
            .used_words
            .checked_add(words)
            .ok_or(FaultKind::OutOfMemory)?;
        if used > self.limit_words {
            return Err(FaultKind::OutOfMemory);
        }
        self.used_words = used;
        Ok(())
    }

    fn insert(&mut self, obj: HeapObject) -> ObjRef {
        self.objects.push(obj);
        self.objects.len() as ObjRef
    }

    /// Allocate a zero-filled instance of `class` with `field_count` word
    /// fields.
    pub fn alloc_instance(
        &mut self,
        class: ClassId,
        field_count: usize,
    ) -> Result<ObjRef, FaultKind> {
        self.charge(field_count + 1)?;
        Ok(self.insert(HeapObject::Instance {
            class,
            fields: vec![0; field_count],
        }))
    }

    /// Allocate a zero-filled array of `len` elements of `elem`.
    pub fn alloc_array(
        &mut self,
        class: ClassId,
        elem: &ArrayElem,
        len: usize,
    ) -> Result<ObjRef, FaultKind> {
        let data = ArrayData::zeroed(elem, len);
        self.charge(data.words() + 1)?;
        Ok(self.insert(HeapObject::Array { class, data }))
    }

    pub fn get(&self, r: ObjRef) -> Result<&HeapObject, FaultKind> {
        if r == NULL {
            return Err(FaultKind::NullPointer);
        }
        usize::try_from(r)
            .ok()
            .and_then(|i| self.objects.get(i - 1))
            .ok_or(FaultKind::BadReference(r))
    }

    pub fn get_mut(&mut self, r: ObjRef) -> Result<&mut HeapObject, FaultKind> {
        if r == NULL {
            return Err(FaultKind::NullPointer);
        }
        usize::try_from(r)
            .ok()
            .and_then(|i| self.objects.get_mut(i - 1))
            .ok_or(FaultKind::BadReference(r))
    }

    /// Class of the referenced object.
    pub fn class_of(&self, r: ObjRef) -> Result<ClassId, FaultKind> {
        Ok(self.get(r)?.class())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_stale_refs_are_distinct_faults() {
        let heap = Heap::new(1024);
        assert_eq!(heap.get(NULL).unwrap_err(), FaultKind::NullPointer);
        assert_eq!(heap.get(7).unwrap_err(), FaultKind::BadReference(7));
        assert_eq!(heap.get(-3).unwrap_err(), FaultKind::BadReference(-3));
    }

    #[test]
    fn allocation_zero_fills() {
        let mut heap = Heap::new(1024);
        let r = heap.alloc_instance(0, 3).unwrap();
        match heap.get(r).unwrap() {
            HeapObject::Instance { fields, .. } => assert_eq!(fields, &vec![0, 0, 0]),
            _ => panic!("expected instance"),
        }
        let a = heap.alloc_array(1, &ArrayElem::Char, 4).unwrap();
        match heap.get(a).unwrap() {
            HeapObject::Array { data, .. } => assert_eq!(data, &ArrayData::Char(vec![0; 4])),
            _ => panic!("expected array"),
        }
    }

    #[test]
    fn the_word_limit_is_enforced() {
        let mut heap = Heap::new(16);
        assert!(heap.alloc_instance(0, 10).is_ok());
        assert_eq!(
            heap.alloc_instance(0, 10).unwrap_err(),
            FaultKind::OutOfMemory
        );
    }

    #[test]
    fn long_arrays_are_charged_two_words_per_element() {
        let mut heap = Heap::new(8);
        assert_eq!(
            heap.alloc_array(0, &ArrayElem::Long, 4).unwrap_err(),
            FaultKind::OutOfMemory
        );
        assert!(heap.alloc_array(0, &ArrayElem::Long, 3).is_ok());
    }
}
