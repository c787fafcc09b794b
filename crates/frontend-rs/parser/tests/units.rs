//! Unit loading against real files

use ast::{InterfaceDecl, Statement, Unit};
use errors::{DiagnosticCode, LoadError, ParserError};
use parser::{ParseOptions, Session};
use std::fs;
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, source: &str) {
    fs::write(dir.join(name), source).unwrap();
}

fn used(unit: &Unit, index: usize) -> Rc<Unit> {
    let uses = unit.interface.uses.as_ref().expect("interface uses clause");
    Rc::clone(uses.items[index].unit.as_ref().expect("loaded unit"))
}

#[test]
fn test_diamond_shares_one_unit() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "base.pas",
        "unit Base; interface type TCount = Integer; implementation end.",
    );
    write(
        dir.path(),
        "left.pas",
        "unit Left; interface uses Base in 'base.pas'; var L: TCount; implementation end.",
    );
    write(
        dir.path(),
        "right.pas",
        "unit Right; interface uses Base in 'base.pas'; var R: TCount; implementation end.",
    );
    let main = dir.path().join("main.pas");
    let source = r#"
program Main;
uses Left in 'left.pas', Right in 'right.pas';
begin
  L := R
end.
"#;

    let parsed = Session::new(ParseOptions::default(), None)
        .parse_program(source, Some(main))
        .unwrap();
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);

    let names: Vec<_> = parsed.units.iter().map(|u| u.ident.name.as_str()).collect();
    assert_eq!(names, vec!["Base", "Left", "Right"]);

    let uses = parsed.program.block.uses.as_ref().unwrap();
    let left = uses.items[0].unit.as_ref().unwrap();
    let right = uses.items[1].unit.as_ref().unwrap();
    assert!(Rc::ptr_eq(&used(left, 0), &used(right, 0)));
    assert!(Rc::ptr_eq(&used(left, 0), &parsed.units[0]));

    let Statement::Assign { target, .. } = &parsed.program.block.block.body.statements[0] else {
        panic!("expected an assignment");
    };
    assert_eq!(target.root.resolved(), left.decl_map.get("L"));
}

#[test]
fn test_cycle_between_files() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.pas", "unit A; interface uses B in 'b.pas'; implementation end.");
    write(dir.path(), "b.pas", "unit B; interface uses A in 'a.pas'; implementation end.");
    let main = dir.path().join("main.pas");

    let err = Session::new(ParseOptions::default(), None)
        .parse_program("program P; uses A in 'a.pas'; begin end.", Some(main))
        .unwrap_err();
    let ParserError::UnitLoad { unit, source, .. } = err else {
        panic!("expected a unit load error");
    };
    assert_eq!(unit, "A");
    match source.root() {
        LoadError::Cycle { chain } => assert_eq!(chain, &["A", "B", "A"]),
        other => panic!("expected a cycle, got {:?}", other),
    }
}

#[test]
fn test_parse_unit_file_pulls_in_dependencies() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "consts.pas", "unit Consts; interface const Scale = 10; implementation end.");
    write(
        dir.path(),
        "geometry.pas",
        r#"
unit Geometry;

interface

uses Consts in 'consts.pas';

const
  Pi2 = 6.28;

function Area(R: Real): Real;

implementation

function Area(R: Real): Real;
begin
  Result := Geometry.Pi2 * R * Consts.Scale
end;

initialization
  Area(1);
finalization
end.
"#,
    );

    let parsed = Session::new(ParseOptions::default(), None)
        .parse_unit_file(&dir.path().join("geometry.pas"))
        .unwrap();
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
    assert_eq!(parsed.unit.ident.name, "Geometry");
    assert_eq!(parsed.units.len(), 2);
    assert!(Rc::ptr_eq(&parsed.unit, &parsed.units[1]));

    // The interface heading is completed by the implementation body
    let area = parsed.unit.decl_map.get("Area").unwrap();
    let decl = parsed.declarations.get(area);
    assert!(decl.forward);
    assert!(decl.definition.is_some());
    assert!(matches!(parsed.unit.interface.decls[1], InterfaceDecl::Heading(_)));

    let init = parsed.unit.init.as_ref().unwrap();
    assert_eq!(init.initialization.len(), 1);
    assert_eq!(init.finalization.as_ref().map(Vec::len), Some(0));
}

#[test]
fn test_missing_unit_file_is_fatal_but_unknown_name_is_not() {
    let dir = TempDir::new().unwrap();
    let main = dir.path().join("main.pas");

    let err = Session::new(ParseOptions::default(), None)
        .parse_program("program P; uses Gone in 'gone.pas'; begin end.", Some(main.clone()))
        .unwrap_err();
    assert!(matches!(
        err,
        ParserError::UnitLoad { ref source, .. } if matches!(**source, LoadError::NotFound { .. })
    ));

    let parsed = Session::new(ParseOptions::default(), None)
        .parse_program("program P; uses SysUtils; begin end.", Some(main))
        .unwrap();
    assert_eq!(parsed.diagnostics.len(), 1);
    assert_eq!(parsed.diagnostics[0].code, Some(DiagnosticCode::UnresolvedUnit));
    assert!(parsed.program.block.uses.as_ref().unwrap().items[0].unit.is_none());
}

#[test]
fn test_error_inside_dependency_names_the_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "bad.pas", "unit Bad; interface const = 1; implementation end.");
    let main = dir.path().join("main.pas");

    let err = Session::new(ParseOptions::default(), None)
        .parse_program("program P; uses Bad in 'bad.pas'; begin end.", Some(main))
        .unwrap_err();
    let ParserError::UnitLoad { source, .. } = err else {
        panic!("expected a unit load error");
    };
    match source.root() {
        LoadError::Parse { path, .. } => assert!(path.ends_with("bad.pas")),
        other => panic!("expected a parse error, got {:?}", other),
    }
}
