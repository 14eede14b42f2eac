use std::fs;

use generator::{FileTemplate, GeneratedTemplate, LabelTarget, Operand, generate};
use tsl::block::attribute::AttributeValue;
use tsl::value::Value;
use tsl::{Error, ErrorKind, SourceLocation};

const TEMPLATE: &str = r#"
[settings]
seed = 3

[data]
target = "M"
types = [{ id = "word", text = ".word", type = { name = "card", args = [32] } }]
spaces = [{ id = "space", text = ".space" }]

[distributions]
small = [{ value = 1, bias = 3 }, { value = [2, 3] }]
mixed = [{ value = { dist = "small" } }, { value = 7 }]

[situations]
zero = { attrs = { size = 8, pick = { dist = "mixed" } } }

[[default_situations]]
names = "add"
situation = "zero"

[pre]
items = [
  { data = { global = true, items = [
      { global_label = "table" },
      { emit = { name = "word", values = [1, 2, { rand = [5, 5] }] } },
      { align = 4 },
      { emit = { name = "space", values = [16] } },
  ] } },
]

[main]
items = [
  { comment = "body" },
  { sequence = { items = [
      { label = "start" },
      { call = { name = "add", args = ["r1", { dist = "small" }] } },
      { numeric_label = 1 },
      { call = { name = "la", args = [{ label = "table" }, { label_b = 1 }] } },
      { executed = { items = [
          { call = { name = "b", args = [{ label = "start" }] } },
      ] } },
  ] } },
]
"#;

fn run(source: &str) -> Result<GeneratedTemplate, Error> {
    let mut template = FileTemplate::parse(source, 0)?;
    let settings = template.settings();
    generate(&mut template, settings)
}

fn expect_error(source: &str, kind: ErrorKind) -> Error {
    match run(source) {
        Ok(generated) => panic!("expected {:?}, got a listing:\n{}", kind, generated),
        Err(err) => {
            assert_eq!(err.kind, kind, "{}", err);
            err
        }
    }
}

fn has_span(err: &Error) -> bool {
    matches!(err.location, Some(SourceLocation::Span { file_id: 0, .. }))
}

#[test]
fn full_template_listing() {
    let generated = run(TEMPLATE).unwrap();
    let listing = generated.to_string();

    assert!(listing.starts_with("// seed 3\n"), "{}", listing);
    assert!(listing.contains("    // body\nstart:\n    add r1, "), "{}", listing);
    assert!(listing.contains(" // zero(pick: <dist>, size: 8)\n"), "{}", listing);
    assert!(listing.contains("1:\n    la table, 1b\n"), "{}", listing);
    assert!(listing.contains("    b start\n"), "{}", listing);
    assert!(
        listing.contains(
            "// data M global\ntable:\n    .word 1, 2, 5\n    .align 4 // 4 byte(s)\n    .space 16, 0\n"
        ),
        "{}",
        listing
    );

    let main = &generated.main.sequences[0];
    assert_eq!(main.len(), 3);
    match &main[0].operands[1] {
        Operand::Value(Value::Integer(n)) => assert!((1..=3).contains(n)),
        other => panic!("expected a sampled integer, got {:?}", other),
    }
    assert_eq!(main[2].attributes.get("executed"), Some(&AttributeValue::Boolean(true)));
    assert!(main[2].situation.is_none());

    assert_eq!(
        generated.address_of("table"),
        Some(LabelTarget::Data {
            section: 0,
            directive: 0
        })
    );
}

#[test]
fn template_and_settings_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = dir.path().join("template.toml");
    let config_path = dir.path().join("settings.toml");
    fs::write(&template_path, TEMPLATE).unwrap();
    fs::write(&config_path, "seed = 42\nrevision = \"rv64\"\n").unwrap();

    let mut template = FileTemplate::load(&template_path, 0).unwrap();
    let settings = template.settings().overlay_file(&config_path).unwrap();
    assert_eq!(settings.seed, 42);
    assert!(settings.is_rev("rv64"));

    let generated = generate(&mut template, settings).unwrap();
    assert!(generated.to_string().starts_with("// seed 42\n"));

    let missing = FileTemplate::load(&dir.path().join("missing.toml"), 0).unwrap_err();
    assert_eq!(missing.kind, ErrorKind::Configuration);
}

#[test]
fn strategies_from_block_attributes() {
    let source = r#"
[main]
items = [
  { block = { attrs = { compositor = "rotation" }, items = [
      { atomic = { items = [
          { call = { name = "lui" } },
          { call = { name = "addi" } },
      ] } },
      { sequence = { items = [
          { call = { name = "x" } },
          { call = { name = "y" } },
      ] } },
  ] } },
]
"#;
    let generated = run(source).unwrap();
    let names: Vec<&str> = generated.main.sequences[0].iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["lui", "addi", "x", "y"]);
}

#[test]
fn syntax_error_has_span() {
    let err = FileTemplate::parse("[main\nitems = []\n", 0).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert!(has_span(&err));
}

#[test]
fn non_integer_label_index() {
    let source = r#"
[main]
items = [ { numeric_label = "one" } ]
"#;
    let err = expect_error(source, ErrorKind::Type);
    assert!(has_span(&err));

    let source = r#"
[main]
items = [ { call = { name = "b", args = [{ label_f = true }] } } ]
"#;
    assert!(has_span(&expect_error(source, ErrorKind::Type)));
}

#[test]
fn numeric_label_out_of_range() {
    let source = r#"
[main]
items = [ { numeric_label = 10 } ]
"#;
    assert!(has_span(&expect_error(source, ErrorKind::Range)));
}

#[test]
fn situation_attributes_must_be_a_table() {
    let source = r#"
[situations]
zero = { attrs = 3 }
"#;
    let err = expect_error(source, ErrorKind::Type);
    assert!(err.message.contains("zero"));
}

#[test]
fn default_situation_names_shape() {
    let source = r#"
[situations]
zero = {}

[[default_situations]]
names = 3
situation = "zero"
"#;
    expect_error(source, ErrorKind::Type);
}

#[test]
fn bad_range_values() {
    let source = r#"
[distributions]
bad = [{ value = { from = 1 } }]
"#;
    expect_error(source, ErrorKind::Type);

    let source = r#"
[distributions]
zero = [{ value = 1, bias = 0 }]
"#;
    expect_error(source, ErrorKind::Range);

    let source = r#"
[distributions]
a = [{ value = { dist = "b" } }]
b = [{ value = { dist = "a" } }]
"#;
    expect_error(source, ErrorKind::Configuration);
}

#[test]
fn bad_origin_shape() {
    let source = r#"
[data]
target = "M"

[pre]
items = [ { data = { items = [ { org = "start" } ] } } ]
"#;
    assert!(has_span(&expect_error(source, ErrorKind::Type)));
}

#[test]
fn strategy_on_wrong_block_kind() {
    let source = r#"
[main]
items = [ { sequence = { attrs = { combinator = "product" }, items = [ { call = { name = "nop" } } ] } } ]
"#;
    let err = expect_error(source, ErrorKind::Configuration);
    assert!(has_span(&err));

    let source = r#"
[main]
items = [ { iterate = { attrs = { rearranger = 1 } } } ]
"#;
    expect_error(source, ErrorKind::Type);
}

#[test]
fn unresolved_label_in_file() {
    let source = r#"
[main]
items = [ { call = { name = "j", args = [{ label = "nowhere" }] } } ]
"#;
    let err = expect_error(source, ErrorKind::Resolution);
    assert!(has_span(&err));
}

#[test]
fn sections_in_file() {
    let source = r#"
[data]
target = "M"
types = [{ id = "byte", text = ".byte", type = { name = "card", args = [8] } }]

[pre]
items = [
  { section_data = { pa = 0x2000, va = 0x2000, items = [
      { data = { items = [ { emit = { name = "byte", values = [1] } } ] } },
  ] } },
]

[main]
items = [
  { section = { name = ".boot", pa = 0x100, va = 0x100, args = "\"ax\"", items = [
      { call = { name = "nop" } },
  ] } },
  { call = { name = "ret" } },
]
"#;
    let listing = run(source).unwrap().to_string();
    assert!(
        listing.contains("// section .boot pa=0x100 va=0x100 \"ax\"\n    nop\n// end of section\n    ret\n"),
        "{}",
        listing
    );
    assert!(listing.contains("// data M in section .data pa=0x2000 va=0x2000\n    .byte 1\n"), "{}", listing);

    let nested = r#"
[main]
items = [
  { section_text = { pa = 0, va = 0, items = [
      { section_data = { pa = 0, va = 0 } },
  ] } },
]
"#;
    assert!(has_span(&expect_error(nested, ErrorKind::Configuration)));
}
