use std::fmt;

/// Which memory section a scope places its code and data in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionKind {
    Named(String),
    Text,
    Data,
}

/// `section(name:, pa:, va:, args:)` and its `.text`/`.data` shorthands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySection {
    pub kind: SectionKind,
    /// Physical load address.
    pub pa: u64,
    /// Virtual address.
    pub va: u64,
    /// Extra assembler arguments, printed verbatim.
    pub args: Option<String>,
}

impl MemorySection {
    pub fn named(name: impl Into<String>, pa: u64, va: u64) -> Self {
        Self::new(SectionKind::Named(name.into()), pa, va)
    }

    pub fn text(pa: u64, va: u64) -> Self {
        Self::new(SectionKind::Text, pa, va)
    }

    pub fn data(pa: u64, va: u64) -> Self {
        Self::new(SectionKind::Data, pa, va)
    }

    fn new(kind: SectionKind, pa: u64, va: u64) -> Self {
        MemorySection {
            kind,
            pa,
            va,
            args: None,
        }
    }

    pub fn args(mut self, args: impl Into<String>) -> Self {
        self.args = Some(args.into());
        self
    }

    pub fn name(&self) -> &str {
        match &self.kind {
            SectionKind::Named(name) => name,
            SectionKind::Text => ".text",
            SectionKind::Data => ".data",
        }
    }
}

impl fmt::Display for MemorySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pa={:#x} va={:#x}", self.name(), self.pa, self.va)?;
        if let Some(args) = &self.args {
            write!(f, " {}", args)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_names() {
        assert_eq!(MemorySection::text(0, 0).name(), ".text");
        assert_eq!(MemorySection::data(0, 0).name(), ".data");
        assert_eq!(MemorySection::named(".boot", 0, 0).name(), ".boot");
    }

    #[test]
    fn display_carries_addresses_and_args() {
        let section = MemorySection::named(".boot", 0x1000, 0x8000_1000).args("\"ax\"");
        assert_eq!(section.to_string(), ".boot pa=0x1000 va=0x80001000 \"ax\"");
        assert_eq!(MemorySection::data(0x20, 0x20).to_string(), ".data pa=0x20 va=0x20");
    }
}
