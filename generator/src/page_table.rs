use std::fmt;
use std::rc::Rc;

use tsl::Error;
use tsl::block::attribute::Attributes;

use crate::data::DataScope;

/// A virtual-to-physical mapping handed to the adaptor.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryObject {
    pub va: u64,
    pub pa: u64,
    pub size: u64,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageTableEntry {
    /// An entry described by its attributes; written by the preparator.
    Attributes(Attributes),
    /// A memory object; written by the adaptor.
    Memory(MemoryObject),
}

impl From<Attributes> for PageTableEntry {
    fn from(attributes: Attributes) -> Self {
        PageTableEntry::Attributes(attributes)
    }
}

impl From<MemoryObject> for PageTableEntry {
    fn from(object: MemoryObject) -> Self {
        PageTableEntry::Memory(object)
    }
}

type Preparator = Rc<dyn Fn(&mut DataScope<'_>, &Attributes) -> Result<(), Error>>;
type Adaptor = Rc<dyn Fn(&mut DataScope<'_>, &MemoryObject) -> Result<(), Error>>;

/// Describes how page-table entries become data.
#[derive(Clone, Default)]
pub struct PageTable {
    preparator: Option<Preparator>,
    adaptor: Option<Adaptor>,
}

impl PageTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preparator<F>(mut self, preparator: F) -> Self
    where
        F: Fn(&mut DataScope<'_>, &Attributes) -> Result<(), Error> + 'static,
    {
        self.preparator = Some(Rc::new(preparator));
        self
    }

    pub fn adaptor<F>(mut self, adaptor: F) -> Self
    where
        F: Fn(&mut DataScope<'_>, &MemoryObject) -> Result<(), Error> + 'static,
    {
        self.adaptor = Some(Rc::new(adaptor));
        self
    }

    pub(crate) fn emit(&self, scope: &mut DataScope<'_>, entry: &PageTableEntry) -> Result<(), Error> {
        match entry {
            PageTableEntry::Attributes(attributes) => match &self.preparator {
                Some(preparator) => preparator(scope, attributes),
                None => Err(Error::not_implemented("page table preparator is not defined")),
            },
            PageTableEntry::Memory(object) => match &self.adaptor {
                Some(adaptor) => adaptor(scope, object),
                None => Err(Error::not_implemented("page table adaptor is not defined")),
            },
        }
    }
}

impl fmt::Debug for PageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageTable")
            .field("preparator", &self.preparator.is_some())
            .field("adaptor", &self.adaptor.is_some())
            .finish()
    }
}
