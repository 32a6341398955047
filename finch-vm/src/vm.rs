//! The shared VM: suite, heap, statics and monitor registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fnv::FnvHashMap;
use parking_lot::Mutex;

use crate::fault::FaultKind;
use crate::heap::{ArrayData, Heap, HeapObject};
use crate::meta::{ArrayElem, ClassId, ConstObject, MethodId, Suite};
use crate::monitor::Monitor;
use crate::thread::Thread;
use crate::value::{ObjRef, Word};

/// Construction-time limits.
#[derive(Clone, Copy, Debug)]
pub struct VmOptions {
    /// Heap budget, in words.
    pub heap_limit_words: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        VmOptions {
            heap_limit_words: 1 << 20,
        }
    }
}

/// The mutable world shared by every guest thread: heap, per-class static
/// storage and the interned constant objects.
#[derive(Debug)]
pub(crate) struct World {
    pub heap: Heap,
    pub statics: Vec<Vec<Word>>,
    pub const_pool: Vec<Vec<ObjRef>>,
}

/// One virtual machine. Guest threads driven from separate host threads
/// share it through an `Arc`.
#[derive(Debug)]
pub struct Vm {
    pub suite: Suite,
    pub(crate) world: Mutex<World>,
    monitors: Mutex<FnvHashMap<ObjRef, Arc<Monitor>>>,
    next_thread: AtomicU64,
}

impl Vm {
    pub fn new(suite: Suite) -> Result<Arc<Vm>, FaultKind> {
        Self::with_options(suite, VmOptions::default())
    }

    /// Build the VM: zero the static storage of every class and intern its
    /// constant objects into the heap.
    pub fn with_options(suite: Suite, options: VmOptions) -> Result<Arc<Vm>, FaultKind> {
        let mut heap = Heap::new(options.heap_limit_words);
        let mut statics = Vec::with_capacity(suite.classes.len());
        let mut const_pool = Vec::with_capacity(suite.classes.len());
        for (id, class) in suite.classes.iter().enumerate() {
            statics.push(vec![0; class.static_fields.len()]);
            let mut pool = Vec::with_capacity(class.const_objects.len());
            for obj in &class.const_objects {
                pool.push(intern(&mut heap, id as ClassId, obj)?);
            }
            const_pool.push(pool);
        }
        Ok(Arc::new(Vm {
            suite,
            world: Mutex::new(World {
                heap,
                statics,
                const_pool,
            }),
            monitors: Mutex::new(FnvHashMap::default()),
            next_thread: AtomicU64::new(1),
        }))
    }

    /// Start a guest thread at `method` of `class` with `args` bound to
    /// its lowest locals.
    pub fn spawn(
        self: &Arc<Self>,
        class: ClassId,
        method: MethodId,
        args: &[Word],
    ) -> Result<Thread, FaultKind> {
        Thread::new(Arc::clone(self), class, method, args)
    }

    pub(crate) fn next_thread_id(&self) -> u64 {
        self.next_thread.fetch_add(1, Ordering::Relaxed)
    }

    /// The monitor record for `obj`, created on first use.
    pub fn monitor_for(&self, obj: ObjRef) -> Arc<Monitor> {
        Arc::clone(
            self.monitors
                .lock()
                .entry(obj)
                .or_insert_with(|| Arc::new(Monitor::new())),
        )
    }

    /// Read a static field word. For embedders and tests.
    pub fn static_word(&self, class: ClassId, slot: usize) -> Option<Word> {
        self.world
            .lock()
            .statics
            .get(class as usize)?
            .get(slot)
            .copied()
    }

    /// Overwrite a static field word. For loaders setting up initial state.
    pub fn set_static_word(&self, class: ClassId, slot: usize, value: Word) -> bool {
        let mut world = self.world.lock();
        match world
            .statics
            .get_mut(class as usize)
            .and_then(|s| s.get_mut(slot))
        {
            Some(w) => {
                *w = value;
                true
            }
            None => false,
        }
    }

    /// Allocate an instance of `class` outside the interpreter. For
    /// embedders and tests.
    pub fn alloc_instance(&self, class: ClassId) -> Result<ObjRef, FaultKind> {
        let fields = self.suite.class_meta(class)?.instance_fields.len();
        self.world.lock().heap.alloc_instance(class, fields)
    }

    /// Allocate an array of `class` outside the interpreter.
    pub fn alloc_array(&self, class: ClassId, len: usize) -> Result<ObjRef, FaultKind> {
        let elem = self
            .suite
            .class_meta(class)?
            .array_element
            .ok_or(FaultKind::NotAnArrayClass(class as Word))?;
        self.world.lock().heap.alloc_array(class, &elem, len)
    }

    /// Read an instance field word.
    pub fn field_word(&self, obj: ObjRef, slot: usize) -> Result<Word, FaultKind> {
        let world = self.world.lock();
        match world.heap.get(obj)? {
            HeapObject::Instance { fields, .. } => fields
                .get(slot)
                .copied()
                .ok_or(FaultKind::BadFieldSlot(slot as u32)),
            HeapObject::Array { .. } => Err(FaultKind::BadFieldSlot(slot as u32)),
        }
    }

    /// Overwrite an instance field word. For loaders and tests.
    pub fn set_field_word(&self, obj: ObjRef, slot: usize, value: Word) -> Result<(), FaultKind> {
        let mut world = self.world.lock();
        match world.heap.get_mut(obj)? {
            HeapObject::Instance { fields, .. } => {
                let w = fields
                    .get_mut(slot)
                    .ok_or(FaultKind::BadFieldSlot(slot as u32))?;
                *w = value;
                Ok(())
            }
            HeapObject::Array { .. } => Err(FaultKind::BadFieldSlot(slot as u32)),
        }
    }

    /// The interned constant object `idx` of `class`.
    pub(crate) fn const_ref(&self, class: ClassId, idx: usize) -> Result<ObjRef, FaultKind> {
        self.world
            .lock()
            .const_pool
            .get(class as usize)
            .and_then(|pool| pool.get(idx))
            .copied()
            .ok_or(FaultKind::BadConstRef(idx as u32))
    }
}

fn intern(heap: &mut Heap, owner: ClassId, obj: &ConstObject) -> Result<ObjRef, FaultKind> {
    // Interned arrays keep the owning class as their class; typed access
    // is driven by the element kind, not the class number.
    let (elem, data) = match obj {
        ConstObject::Str(s) => {
            let units: Vec<u16> = s.encode_utf16().collect();
            (ArrayElem::Char, ArrayData::Char(units))
        }
        ConstObject::Bytes(v) => (ArrayElem::Byte, ArrayData::Byte(v.clone())),
        ConstObject::Shorts(v) => (ArrayElem::Short, ArrayData::Short(v.clone())),
        ConstObject::Chars(v) => (ArrayElem::Char, ArrayData::Char(v.clone())),
        ConstObject::Ints(v) => (ArrayElem::Int, ArrayData::Int(v.clone())),
        ConstObject::Longs(v) => (ArrayElem::Long, ArrayData::Long(v.clone())),
    };
    let r = heap.alloc_array(owner, &elem, data.len())?;
    match heap.get_mut(r)? {
        HeapObject::Array { data: slot, .. } => *slot = data,
        HeapObject::Instance { .. } => return Err(FaultKind::BadReference(r)),
    }
    Ok(r)
}
