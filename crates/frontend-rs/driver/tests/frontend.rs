//! End-to-end runs over files on disk

use ast::Statement;
use driver::{Frontend, FrontendError};
use errors::{DiagnosticCode, ParserError};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;

fn write(path: &Path, source: &str) {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).unwrap();
    }
    fs::write(path, source).unwrap();
}

/// `src/main.pas` uses `Local` from `src/` and `Shared` from `lib/`
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        &dir.path().join("lib/SHARED.PAS"),
        r#"
unit Shared;
interface
type
  TPoint = record
    X, Y: Integer;
  end;
function Origin: TPoint;
implementation
function Origin: TPoint;
begin
  Result.X := 0;
  Result.Y := 0
end;
end.
"#,
    );
    write(
        &dir.path().join("src/local.pp"),
        r#"
unit Local;
interface
uses Shared;
var Here: TPoint;
implementation
end.
"#,
    );
    write(
        &dir.path().join("src/main.pas"),
        r#"
program Main;
uses Shared, Local;
var P: TPoint;
begin
  P := Origin;
  Here.X := P.Y;
  Unknown := 1
end.
"#,
    );
    dir
}

#[test]
fn test_program_with_search_path() {
    let dir = project();
    let mut frontend = Frontend::new();
    frontend.add_search_path(dir.path().join("lib"));

    let parsed = frontend.parse_program_file(&dir.path().join("src/main.pas")).unwrap();
    let names: Vec<_> = parsed.units.iter().map(|u| u.ident.name.as_str()).collect();
    assert_eq!(names, vec!["Shared", "Local"]);

    // Only `Unknown` fails to resolve
    assert_eq!(parsed.diagnostics.len(), 1);
    assert_eq!(parsed.diagnostics[0].code, Some(DiagnosticCode::UnresolvedReference));
    assert_eq!(parsed.diagnostics[0].name.as_deref(), Some("Unknown"));
    assert!(parsed.diagnostics[0].format_fpc().contains("main.pas(8,3) Warning"));
    assert_eq!(Frontend::error_count(&parsed.diagnostics), 0);

    // Local's `uses Shared` got the unit the program loaded
    let shared = &parsed.units[0];
    let local_uses = parsed.units[1].interface.uses.as_ref().unwrap();
    assert!(Rc::ptr_eq(shared, local_uses.items[0].unit.as_ref().unwrap()));

    let Statement::Assign { target, .. } = &parsed.program.block.block.body.statements[1] else {
        panic!("expected an assignment");
    };
    assert_eq!(target.root.resolved(), parsed.units[1].decl_map.get("Here"));
    assert!(target.items.iter().all(|item| match item {
        ast::DesignatorItem::Field(field) => field.resolved.is_some(),
        _ => true,
    }));
}

#[test]
fn test_without_search_path_units_stay_unresolved() {
    let dir = project();
    let frontend = Frontend::new();
    let parsed = frontend.parse_program_file(&dir.path().join("src/main.pas")).unwrap();
    let codes: Vec<_> = parsed.diagnostics.iter().filter_map(|d| d.code).collect();
    assert_eq!(codes[0], DiagnosticCode::UnresolvedUnit);
    let names: Vec<_> = parsed.units.iter().map(|u| u.ident.name.as_str()).collect();
    assert_eq!(names, vec!["Local"]);
}

#[test]
fn test_strict_mode_through_the_driver() {
    let dir = project();
    let mut frontend = Frontend::new();
    frontend.add_search_path(dir.path().join("lib"));
    frontend.set_strict(true);

    match frontend.parse_program_file(&dir.path().join("src/main.pas")) {
        Err(FrontendError::Parse(ParserError::Strict { diagnostic })) => {
            assert_eq!(diagnostic.name.as_deref(), Some("Unknown"));
        }
        other => panic!("expected a strict failure, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_parse_unit_file() {
    let dir = project();
    let frontend = Frontend::new();
    let parsed = frontend.parse_unit_file(&dir.path().join("lib/SHARED.PAS")).unwrap();
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    assert_eq!(parsed.unit.ident.name, "Shared");
    assert!(parsed.unit.decl_map.contains("origin"));
}
