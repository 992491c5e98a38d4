use kvdoc::decode::parse_document;
use kvdoc::{ErrorKind, Kv, ReadOptions, Value};
use rstest::rstest;

#[rstest]
#[case::duplicate_key("a = 1, a = 2", "duplicate key", 1, 8)]
#[case::count_too_small("list = [2] { 1, 2, 3 }", "declares 2 elements", 1, 8)]
#[case::count_too_large("list = [4] { 1, 2 }", "declares 4 elements", 1, 8)]
#[case::unterminated_string("a = 1,\nb = \"x", "unterminated string", 2, 5)]
#[case::missing_value("a = ,", "expected a value", 1, 5)]
fn test_parse_errors_carry_location(
    #[case] text: &str,
    #[case] message: &str,
    #[case] line: usize,
    #[case] column: usize,
) {
    let err = Kv::read(text).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Parse);
    assert!(err.message.contains(message), "{err}");
    let location = err.location.expect("parse errors have a location");
    assert_eq!(location.line, line, "{err}");
    assert_eq!(location.column, column, "{err}");
}

#[test]
fn test_parent_links_match_nesting_depth() {
    let text = "a = { b = { c = { d = 1 } }, e = [2] { { f = 1 }, [1] { { g = { h = 2 } } } } }";
    let doc = parse_document(text, &ReadOptions::default()).unwrap();

    fn walk(doc: &kvdoc::Document<'_>, index: usize, depth: usize, seen: &mut usize) {
        assert_eq!(doc.depth(index), Some(depth));
        *seen += 1;
        let object = doc.object(index).unwrap();
        for field in &object.fields {
            visit(doc, &field.value, index, depth, seen);
        }
    }

    fn visit(
        doc: &kvdoc::Document<'_>,
        value: &Value<'_>,
        parent: usize,
        depth: usize,
        seen: &mut usize,
    ) {
        match value {
            Value::Object(child) => {
                assert_eq!(doc.object(*child).unwrap().parent, Some(parent));
                walk(doc, *child, depth + 1, seen);
            }
            Value::Array(items) => {
                for item in items {
                    visit(doc, item, parent, depth, seen);
                }
            }
            _ => {}
        }
    }

    let mut seen = 0;
    walk(&doc, 0, 0, &mut seen);
    assert_eq!(seen, doc.objects.len());
    assert_eq!(doc.root().unwrap().parent, None);
}

#[test]
fn test_write_count_mismatch_is_sticky() {
    let mut kv = Kv::write();
    let mut count = 3;
    kv.array_begin(&mut count, Some("list")).unwrap();
    let mut value = 1i32;
    kv.val_i32(&mut value).unwrap();
    let err = kv.array_end().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Misuse);
    assert!(err.message.contains("declared 3"), "{err}");

    let again = kv.key("other").unwrap_err();
    assert_eq!(again, err);
    assert_eq!(kv.last_error(), Some(&err));
    assert!(kv.buffer().is_err());
}

#[test]
fn test_too_many_elements_is_misuse() {
    let mut kv = Kv::write();
    let mut count = 1;
    kv.array_begin(&mut count, Some("list")).unwrap();
    let mut value = 1i32;
    kv.val_i32(&mut value).unwrap();
    let err = kv.val_i32(&mut value).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Misuse);
}

#[test]
fn test_missing_key_is_not_sticky() {
    let mut kv = Kv::read("a = 1").unwrap();
    let err = kv.key("missing").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Lookup);
    assert_eq!(err.key.as_deref(), Some("missing"));
    assert!(kv.last_error().is_none());

    let mut value = 0i32;
    kv.field("a", &mut value).unwrap();
    assert_eq!(value, 1);
}

#[test]
fn test_wrong_type_is_lookup_error() {
    let mut kv = Kv::read("a = \"text\", list = [1] { \"x\" }, n = 1").unwrap();
    let mut value = 0i32;
    let err = kv.field("a", &mut value).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Lookup);

    let mut count = 0;
    let err = kv.object_begin(Some("list")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Lookup);
    kv.array_begin(&mut count, Some("list")).unwrap();
    assert!(kv.val_i32(&mut value).is_err());
    let err = kv.val_i32(&mut value).unwrap_err();
    assert!(err.message.contains("cannot read element 1"), "{err}");
    kv.array_end().unwrap();

    let mut count = 0;
    assert!(kv.array_begin(&mut count, Some("n")).is_err());
}

#[test]
fn test_unbalanced_scopes_are_misuse() {
    let mut kv = Kv::read("sub = { a = 1 }").unwrap();
    let err = kv.object_end().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Misuse);

    let mut kv = Kv::write();
    kv.object_begin(Some("sub")).unwrap();
    let err = kv.array_end().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Misuse);
}

#[test]
fn test_value_without_key_is_misuse() {
    let mut kv = Kv::write();
    let mut value = 1i32;
    let err = kv.val_i32(&mut value).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Misuse);
}

#[test]
fn test_base_must_be_read_mode() {
    let writer = Kv::write();
    let mut kv = Kv::write();
    let err = kv.set_base(&writer).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Misuse);
}

#[test]
fn test_non_finite_float_is_encode_error() {
    let mut kv = Kv::write();
    let mut value = f64::NAN;
    let err = kv.field("x", &mut value).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Encode);
}

#[test]
fn test_depth_limit() {
    let options = ReadOptions::default().with_max_depth(2);
    assert!(Kv::read_with_options("a = { b = 1 }", &options).is_ok());
    let err = Kv::read_with_options("a = { b = { c = { d = 1 } } }", &options).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Parse);
    assert!(err.message.contains("maximum depth"), "{err}");
}

#[rstest]
#[case("a = 1, b = [2] { 1, 2 }", true)]
#[case("a = 1, a = 2", false)]
#[case("a = {", false)]
#[case("", true)]
fn test_validate_str(#[case] text: &str, #[case] valid: bool) {
    assert_eq!(kvdoc::validate_str(text).is_ok(), valid);
}
