// dictionary.rs - Append-only chain of named words

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::value::{placeholder, Callable, Value};

/// One word. `compiled` holds the threaded body: a mix of callables and
/// inline literal values. A zero-length body means a pure primitive.
pub struct DictEntry {
    pub name: Option<String>,
    pub previous: Option<DictEntryRef>,
    pub immediate: bool,
    pub primitive: Callable,
    pub compiled: Vec<Value>,
}

pub type DictEntryRef = Rc<RefCell<DictEntry>>;

impl fmt::Debug for DictEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictEntry")
            .field("name", &self.name)
            .field("immediate", &self.immediate)
            .field("cells", &self.compiled.len())
            .finish()
    }
}

/// The word chain, most recent first. All contexts share one dictionary;
/// a definition made inside a handler is visible everywhere afterwards.
///
/// Until `seal` is called every named definition is also registered in the
/// core-word table, which lets core words reach each other by name even
/// after a user shadows them.
pub struct Dictionary {
    latest: Option<DictEntryRef>,
    core: HashMap<String, Callable>,
    sealed: bool,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary {
            latest: None,
            core: HashMap::new(),
            sealed: false,
        }
    }

    /// Create an entry. Named entries become the new `latest`; anonymous
    /// entries are reachable only through references held on stacks.
    pub fn define(
        &mut self,
        name: Option<&str>,
        primitive: Callable,
        immediate: bool,
    ) -> DictEntryRef {
        let entry = Rc::new(RefCell::new(DictEntry {
            name: name.map(str::to_string),
            previous: self.latest.clone(),
            immediate,
            primitive,
            compiled: Vec::new(),
        }));
        if let Some(name) = name {
            trace!(word = name, "define");
            if !self.sealed {
                let prim = entry.borrow().primitive.clone();
                if self.core.insert(name.to_string(), prim).is_some() {
                    panic!("duplicate core word: {}", name);
                }
            }
            self.latest = Some(entry.clone());
        }
        entry
    }

    /// Create an entry whose primitive needs a handle to the entry itself
    /// (the colon definition's DOCOL, a variable's cell pusher).
    pub fn define_with_self(
        &mut self,
        name: Option<&str>,
        immediate: bool,
        make: impl FnOnce(DictEntryRef) -> Callable,
    ) -> DictEntryRef {
        let entry = self.define(name, placeholder(), immediate);
        let primitive = make(entry.clone());
        entry.borrow_mut().primitive = primitive;
        entry
    }

    pub fn define_anonymous(&mut self) -> DictEntryRef {
        self.define(None, placeholder(), false)
    }

    /// Linear search from `latest` backward; later definitions shadow
    /// earlier ones. Lookup is case-sensitive.
    pub fn find(&self, name: &str) -> Option<DictEntryRef> {
        let mut current = self.latest.clone();
        while let Some(entry) = current {
            if entry.borrow().name.as_deref() == Some(name) {
                return Some(entry);
            }
            current = entry.borrow().previous.clone();
        }
        None
    }

    /// A core primitive by name, bypassing the user dictionary.
    pub fn core_word(&self, name: &str) -> Option<Callable> {
        self.core.get(name).cloned()
    }

    /// End the core-definition phase. Later definitions no longer touch
    /// the core table.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn latest(&self) -> Option<DictEntryRef> {
        self.latest.clone()
    }

    /// All named words, most recent first.
    pub fn names(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = self.latest.clone();
        while let Some(entry) = current {
            if let Some(name) = entry.borrow().name.clone() {
                out.push(name);
            }
            current = entry.borrow().previous.clone();
        }
        out
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}
