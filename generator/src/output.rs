//! Text rendering of generated templates.

use std::fmt::{self, Write as _};

use tsl::block::call::{Argument, Output};
use tsl::block::{Block, Element};
use tsl::data::{DataDirective, DataSection};
use tsl::label::LabelRef;

use crate::resolve::{Instruction, Operand};
use crate::template::{GeneratedTemplate, Phase};

const INDENT: &str = "    ";

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(value) => write!(f, "{}", value),
            Operand::Label {
                reference: LabelRef::Numeric { forward, .. },
                target: Some(label),
            } => write!(f, "{}{}", label.rendered, if *forward { 'f' } else { 'b' }),
            Operand::Label {
                target: Some(label), ..
            } => f.write_str(&label.rendered),
            Operand::Label { reference, .. } => write!(f, "{}", reference),
            Operand::Address(reference) => write!(f, "{}", reference),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for output in &self.outputs {
            match output {
                Output::Text(text) => writeln!(f, "{}{}", INDENT, text)?,
                Output::Comment(text) => writeln!(f, "{}// {}", INDENT, text)?,
            }
        }
        for label in &self.labels {
            writeln!(f, "{}:", label.rendered)?;
        }
        if !self.is_executable() {
            return Ok(());
        }
        write!(f, "{}{}", INDENT, self.name)?;
        for (i, operand) in self.operands.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}", sep, operand)?;
        }
        if let Some(situation) = &self.situation {
            write!(f, " // {}", situation)?;
        }
        writeln!(f)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// {} phase", self.kind)?;
        for (index, sequence) in self.sequences.iter().enumerate() {
            if self.sequences.len() > 1 {
                writeln!(f, "// sequence {}", index)?;
            }
            let mut section = None;
            for instruction in sequence {
                if instruction.section.as_ref() != section {
                    match &instruction.section {
                        Some(entered) => writeln!(f, "// section {}", entered)?,
                        None => writeln!(f, "// end of section")?,
                    }
                    section = instruction.section.as_ref();
                }
                write!(f, "{}", instruction)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for GeneratedTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// seed {}", self.seed)?;
        for phase in self.phases() {
            write!(f, "{}", phase)?;
        }
        for section in &self.data {
            write_section(f, section)?;
        }
        Ok(())
    }
}

fn write_section(f: &mut fmt::Formatter<'_>, section: &DataSection) -> fmt::Result {
    write!(f, "// data {}", section.target)?;
    if section.global {
        write!(f, " global")?;
    }
    if section.separate_file {
        write!(f, " separate-file")?;
    }
    if let Some(memory) = &section.section {
        write!(f, " in section {}", memory)?;
    }
    writeln!(f)?;

    for directive in &section.directives {
        match directive {
            DataDirective::Label(label) => writeln!(f, "{}:", label.name)?,
            DataDirective::Values { text, values, .. } => {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                writeln!(f, "{}{} {}", INDENT, text, values.join(", "))?;
            }
            DataDirective::Space {
                text,
                fill_with,
                length,
            } => writeln!(f, "{}{} {}, {}", INDENT, text, length, fill_with)?,
            DataDirective::AsciiStrings { text, strings, .. } => {
                let strings: Vec<String> = strings.iter().map(|s| format!("{:?}", s)).collect();
                writeln!(f, "{}{} {}", INDENT, text, strings.join(", "))?;
            }
            DataDirective::Text(text) => writeln!(f, "{}{}", INDENT, text)?,
            DataDirective::Comment(text) => writeln!(f, "{}// {}", INDENT, text)?,
            DataDirective::Origin(address) => writeln!(f, "{}.org {:#x}", INDENT, address)?,
            DataDirective::RelativeOrigin(delta) => writeln!(f, "{}.org {:+}", INDENT, delta)?,
            DataDirective::Align { value, bytes } => {
                writeln!(f, "{}.align {} // {} byte(s)", INDENT, value, bytes)?
            }
        }
    }
    Ok(())
}

/// The composition tree of a block, one node per line.
pub fn render_tree(block: &Block) -> String {
    let mut out = String::new();
    tree_node(&mut out, block, 0);
    out
}

fn tree_node(out: &mut String, block: &Block, depth: usize) {
    let pad = "  ".repeat(depth);
    let _ = write!(out, "{}{} {}", pad, block.kind.name(), block.id);
    for (option, name) in block.strategies.attached() {
        let _ = write!(out, " {}={}", option, name);
    }
    out.push('\n');

    for child in &block.children {
        match child {
            Element::Block(nested) => tree_node(out, nested, depth + 1),
            Element::Call(call) => {
                let pad = "  ".repeat(depth + 1);
                for label in &call.labels {
                    let _ = writeln!(out, "{}{}:", pad, label.name);
                }
                if call.is_executable() {
                    let args: Vec<String> = call.arguments.iter().map(argument).collect();
                    let _ = writeln!(out, "{}{} {}", pad, call.name, args.join(", "));
                }
            }
        }
    }
}

fn argument(argument: &Argument) -> String {
    match argument {
        Argument::Value(value) => value.to_string(),
        Argument::Random(_) => "rand(dist)".to_string(),
        Argument::RandomRange(range) => format!("rand({}, {})", range.start(), range.end()),
        Argument::Label(reference) => reference.to_string(),
        Argument::Address(reference) => reference.to_string(),
    }
}
