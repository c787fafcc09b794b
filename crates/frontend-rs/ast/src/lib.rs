//! Object Pascal Abstract Syntax Tree (AST)
//!
//! This crate defines the resolved syntax tree produced by the parser. Each
//! grammar category is a closed enum (types, statements, factors,
//! designator items, declaration sections, interface declarations).
//!
//! Identifier uses are [`IdentRef`]s whose `resolved` field holds the
//! [`DeclId`] of the declaration they bind to. Declaring nodes carry a
//! [`NodeId`] so a declaration can point back at the node that introduced
//! it.

use serde::Serialize;
use std::path::PathBuf;
use std::rc::Rc;

mod locations;
mod walk;

pub use locations::{ClearLocations, HasRange};
pub use symbols::{DeclId, DeclMap, Ident, NodeId};
pub use tokens::Location;
pub use walk::NodeRef;

/// An identifier used as a reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentRef {
    pub ident: Ident,
    /// Declaration the reference binds to, if resolution succeeded
    pub resolved: Option<DeclId>,
}

impl IdentRef {
    pub fn new(ident: Ident, resolved: Option<DeclId>) -> Self {
        Self { ident, resolved }
    }

    pub fn name(&self) -> &str {
        &self.ident.name
    }
}

/// A reference that may be qualified by a unit name (`SysUtils.Exception`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualifiedIdent {
    pub unit: Option<Ident>,
    pub ident: IdentRef,
}

impl QualifiedIdent {
    pub fn simple(ident: IdentRef) -> Self {
        Self { unit: None, ident }
    }

    pub fn resolved(&self) -> Option<DeclId> {
        self.ident.resolved
    }
}

// ===== Program Structure =====

/// Program node - root of a program parse
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub id: NodeId,
    pub path: Option<PathBuf>,
    pub ident: Ident,
    /// Program parameters (`program Foo(Input, Output);`)
    pub params: Vec<Ident>,
    pub block: ProgramBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramBlock {
    pub uses: Option<UsesClause>,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsesClause {
    pub items: Vec<UsesClauseItem>,
}

/// One `uses` dependency
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsesClauseItem {
    /// Unit name; dotted names are kept whole
    pub ident: Ident,
    /// Path given with `in '...'`
    pub explicit_path: Option<String>,
    /// The loaded unit, shared by every `uses` site that names it
    #[serde(skip)]
    pub unit: Option<Rc<Unit>>,
}

/// Unit node - a separately parsed module
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unit {
    pub id: NodeId,
    pub path: Option<PathBuf>,
    pub ident: Ident,
    pub portability: Vec<Ident>,
    pub interface: InterfaceSection,
    pub implementation: ImplementationSection,
    pub init: Option<InitSection>,
    /// Interface declarations exported to units and programs that use this one
    #[serde(skip)]
    pub decl_map: DeclMap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceSection {
    pub uses: Option<UsesClause>,
    pub decls: Vec<InterfaceDecl>,
}

/// Declarations allowed in a unit interface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum InterfaceDecl {
    Const(ConstSection),
    Type(TypeSection),
    Var(VarSection),
    /// Routine heading, completed in the implementation section
    Heading(RoutineDecl),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImplementationSection {
    pub uses: Option<UsesClause>,
    pub decls: Vec<DeclSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitSection {
    pub initialization: Vec<Statement>,
    pub finalization: Option<Vec<Statement>>,
}

/// Block node - declarations followed by a compound statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub decls: Vec<DeclSection>,
    pub body: CompoundStmt,
    pub range: Option<Location>,
}

// ===== Declarations =====

/// Declaration sections; they may repeat and interleave inside a block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DeclSection {
    Label(LabelSection),
    Const(ConstSection),
    Type(TypeSection),
    Var(VarSection),
    Routine(RoutineDecl),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelSection {
    pub labels: Vec<LabelDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelDecl {
    pub id: NodeId,
    pub ident: Ident,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstSection {
    /// `resourcestring` rather than `const`
    pub resource: bool,
    pub decls: Vec<ConstDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstDecl {
    pub id: NodeId,
    pub ident: Ident,
    /// Declared type of a typed constant
    pub type_expr: Option<TypeExpr>,
    pub value: ConstValue,
    pub portability: Vec<Ident>,
}

/// Constant value; typed constants of array and record types take aggregates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConstValue {
    Expr(Expr),
    Array(Vec<ConstValue>),
    Record(Vec<RecordConstField>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordConstField {
    pub field: IdentRef,
    pub value: ConstValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeSection {
    pub decls: Vec<TypeDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDecl {
    pub id: NodeId,
    pub ident: Ident,
    pub type_expr: TypeExpr,
    pub portability: Vec<Ident>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarSection {
    /// `threadvar` rather than `var`
    pub thread: bool,
    pub decls: Vec<VarDecl>,
}

/// `A, B: Integer;` - one node shared by every name it declares
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarDecl {
    pub id: NodeId,
    pub idents: Vec<Ident>,
    pub type_expr: TypeExpr,
    pub absolute: Option<IdentRef>,
    pub init: Option<ConstValue>,
    pub portability: Vec<Ident>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoutineKind {
    Procedure,
    Function,
    Constructor,
    Destructor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutineDecl {
    pub id: NodeId,
    pub heading: RoutineHeading,
    pub directives: Vec<RoutineDirective>,
    /// `None` for headings, forward and external declarations
    pub body: Option<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutineHeading {
    pub kind: RoutineKind,
    /// `class procedure` / `class function`
    pub class_method: bool,
    /// Class named by a method implementation (`TFoo` in `TFoo.Bar`)
    pub qualifier: Option<IdentRef>,
    pub ident: Ident,
    /// `None` when the parameter list is omitted
    pub params: Option<Vec<FormalParam>>,
    pub result: Option<TypeExpr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamMode {
    Value,
    Var,
    Const,
    Out,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormalParam {
    pub id: NodeId,
    pub mode: ParamMode,
    pub idents: Vec<Ident>,
    /// Untyped `var`/`const` parameters have no type
    pub type_expr: Option<TypeExpr>,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RoutineDirective {
    Forward,
    External {
        library: Option<Expr>,
        name: Option<Expr>,
    },
    Overload,
    Virtual,
    Dynamic,
    Override,
    Abstract,
    Reintroduce,
    Static,
    Inline,
    Assembler,
    Message(Expr),
    CallingConvention(Ident),
    Portability(Ident),
}

// ===== Types =====

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypeExpr {
    Named(QualifiedIdent),
    /// `string` or `string[n]`
    String(Option<Box<Expr>>),
    Subrange {
        low: Box<Expr>,
        high: Box<Expr>,
    },
    Enumerated(Vec<EnumElement>),
    Array(ArrayType),
    ArrayOfConst,
    Set(Box<TypeExpr>),
    File(Option<Box<TypeExpr>>),
    Record(RecordType),
    Pointer(Box<TypeExpr>),
    Procedure(ProcedureType),
    Class(ClassType),
    ClassOf(QualifiedIdent),
    /// `class;` / `interface;` forward declaration
    ForwardClass(ClassKind),
    /// `type Integer`
    Distinct(Box<TypeExpr>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumElement {
    pub id: NodeId,
    pub ident: Ident,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayType {
    pub packed: bool,
    /// Empty for dynamic and open arrays (`array of T`)
    pub indexes: Vec<TypeExpr>,
    pub element: Box<TypeExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordType {
    pub packed: bool,
    pub fields: Vec<FieldDecl>,
    pub variant: Option<VariantPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDecl {
    pub id: NodeId,
    pub idents: Vec<Ident>,
    pub type_expr: TypeExpr,
}

/// `case Tag: TKind of ...` part of a record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantPart {
    pub id: NodeId,
    pub tag: Option<Ident>,
    pub tag_type: QualifiedIdent,
    pub cases: Vec<VariantCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantCase {
    pub labels: Vec<Expr>,
    pub fields: Vec<FieldDecl>,
    pub variant: Option<Box<VariantPart>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureType {
    pub kind: RoutineKind,
    pub params: Vec<FormalParam>,
    pub result: Option<Box<TypeExpr>>,
    pub of_object: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClassKind {
    Class,
    Object,
    Interface,
    DispInterface,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassType {
    pub kind: ClassKind,
    pub ancestors: Vec<QualifiedIdent>,
    /// Interface GUID (`['{...}']`)
    pub guid: Option<Expr>,
    pub sections: Vec<ClassSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Visibility {
    Default,
    Private,
    StrictPrivate,
    Protected,
    StrictProtected,
    Public,
    Published,
    Automated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSection {
    pub visibility: Visibility,
    pub members: Vec<ClassMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClassMember {
    Field(FieldDecl),
    Method(RoutineDecl),
    Property(PropertyDecl),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyDecl {
    pub id: NodeId,
    pub ident: Ident,
    /// Index parameters of an array property
    pub params: Vec<FormalParam>,
    /// `None` when an inherited property is only redeclared
    pub type_ref: Option<QualifiedIdent>,
    pub specifiers: Vec<PropertySpecifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PropertySpecifier {
    Read(IdentRef),
    Write(IdentRef),
    Index(Expr),
    Default(Option<Expr>),
    NoDefault,
    Stored(Expr),
    Implements(Vec<QualifiedIdent>),
    ReadOnly,
    WriteOnly,
    DispId(Expr),
}

// ===== Expressions =====

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Factor(Factor),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    // Relational
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    In,
    Is,
    // Additive
    Add,
    Sub,
    Or,
    Xor,
    // Multiplicative
    Mul,
    RealDiv,
    Div,
    Mod,
    And,
    Shl,
    Shr,
    As,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Factor {
    Designator(Designator),
    Number(Numeral),
    String(StringLiteral),
    Nil,
    Set(Vec<SetElement>),
    /// Parenthesized expression, optionally followed by designator items
    /// (`(Obj as TFoo).Bar`)
    Paren {
        expr: Box<Expr>,
        items: Vec<DesignatorItem>,
    },
    AddressOf(Designator),
    Inherited(Option<Designator>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Numeral {
    pub text: String,
    pub real: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StringLiteral {
    /// Source text, quotes and character codes included
    pub text: String,
    /// Decoded value
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetElement {
    pub low: Expr,
    pub high: Option<Expr>,
}

/// `Root.Field[Index]^(Args)` access chain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Designator {
    pub root: QualifiedIdent,
    pub items: Vec<DesignatorItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DesignatorItem {
    Field(IdentRef),
    Index(Vec<Expr>),
    Deref,
    Call(Vec<Arg>),
}

/// Call argument; `Write(X:8:2)` formatting included
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Arg {
    pub value: Expr,
    pub width: Option<Expr>,
    pub decimals: Option<Expr>,
}

// ===== Statements =====

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Statement {
    Empty,
    Labeled {
        label: IdentRef,
        statement: Box<Statement>,
    },
    Assign {
        target: Designator,
        value: Expr,
    },
    Call(Designator),
    /// Assignment or call through a parenthesized expression, as in
    /// `(Sender as TButton).Caption := ''`. `target` is the
    /// [`Factor::Paren`] with its trailing selectors.
    ParenTarget {
        target: Expr,
        value: Option<Expr>,
    },
    Inherited(Option<Designator>),
    Goto(IdentRef),
    Compound(CompoundStmt),
    If {
        condition: Expr,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    Case(CaseStmt),
    For {
        variable: IdentRef,
        start: Expr,
        direction: ForDirection,
        end: Expr,
        body: Box<Statement>,
    },
    ForIn {
        variable: IdentRef,
        collection: Expr,
        body: Box<Statement>,
    },
    While {
        condition: Expr,
        body: Box<Statement>,
    },
    Repeat {
        statements: Vec<Statement>,
        condition: Expr,
    },
    With {
        targets: Vec<Expr>,
        body: Box<Statement>,
    },
    TryExcept(TryExceptStmt),
    TryFinally {
        statements: Vec<Statement>,
        finally: Vec<Statement>,
    },
    Raise {
        exception: Option<Expr>,
        at: Option<Expr>,
    },
    /// Assembler body; its content is not parsed
    Asm(AsmStmt),
}

/// `begin ... end`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompoundStmt {
    pub statements: Vec<Statement>,
    pub range: Option<Location>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ForDirection {
    To,
    DownTo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseStmt {
    pub selector: Expr,
    pub arms: Vec<CaseArm>,
    pub else_branch: Option<Vec<Statement>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseArm {
    pub labels: Vec<CaseLabel>,
    pub statement: Statement,
}

/// `1` or `1..5`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseLabel {
    pub low: Expr,
    pub high: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TryExceptStmt {
    pub statements: Vec<Statement>,
    /// `on E: T do ...` handlers
    pub handlers: Vec<ExceptionHandler>,
    /// `else` part after the handlers
    pub else_branch: Option<Vec<Statement>>,
    /// Plain statements of an `except` part without handlers
    pub except_statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptionHandler {
    pub id: NodeId,
    pub ident: Option<Ident>,
    pub type_ref: QualifiedIdent,
    pub statement: Statement,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AsmStmt {
    pub range: Option<Location>,
}

impl Designator {
    pub fn simple(root: IdentRef) -> Self {
        Self {
            root: QualifiedIdent::simple(root),
            items: Vec::new(),
        }
    }
}

impl Expr {
    /// The designator of a bare designator expression
    pub fn as_designator(&self) -> Option<&Designator> {
        match self {
            Expr::Factor(Factor::Designator(d)) => Some(d),
            _ => None,
        }
    }
}

impl RoutineDecl {
    pub fn has_directive(&self, directive: &RoutineDirective) -> bool {
        self.directives.iter().any(|d| d == directive)
    }
}
