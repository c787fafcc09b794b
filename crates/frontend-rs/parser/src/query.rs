//! AST Query System
//!
//! Search helpers over the parsed tree. Results carry the child-index path
//! from the root they were found under, so callers can reason about nesting
//! without parent pointers.

use ast::{IdentRef, NodeRef};
use symbols::{DeclId, NodeId};
use tokens::{Location, Position};

/// One matched node
#[derive(Debug, Clone)]
pub struct QueryResult<'a> {
    pub node: NodeRef<'a>,
    /// Span of the identifiers inside the node, if it has any
    pub span: Option<Location>,
    /// Child indexes leading from the root to this node
    pub path: Vec<usize>,
}

/// AST query helpers
pub struct AstQuery;

impl AstQuery {
    /// Find every node matching `predicate`, in pre-order
    pub fn find_all<'a, F>(root: NodeRef<'a>, predicate: F) -> Vec<QueryResult<'a>>
    where
        F: Fn(&NodeRef<'a>) -> bool,
    {
        let mut results = Vec::new();
        let mut path = Vec::new();
        Self::find_all_recursive(root, &predicate, &mut results, &mut path);
        results
    }

    /// First node matching `predicate` in pre-order
    pub fn find_first<'a, F>(root: NodeRef<'a>, predicate: F) -> Option<QueryResult<'a>>
    where
        F: Fn(&NodeRef<'a>) -> bool,
    {
        let mut path = Vec::new();
        Self::find_first_recursive(root, &predicate, &mut path)
    }

    /// Nodes whose [`NodeRef::kind_name`] is `kind`
    pub fn find_by_kind<'a>(root: NodeRef<'a>, kind: &str) -> Vec<QueryResult<'a>> {
        Self::find_all(root, |node| node.kind_name() == kind)
    }

    /// Procedure, function, constructor and destructor declarations,
    /// headings included
    pub fn find_routines<'a>(root: NodeRef<'a>) -> Vec<QueryResult<'a>> {
        Self::find_all(root, |node| matches!(node, NodeRef::RoutineDecl(_)))
    }

    pub fn find_variables<'a>(root: NodeRef<'a>) -> Vec<QueryResult<'a>> {
        Self::find_all(root, |node| matches!(node, NodeRef::VarDecl(_)))
    }

    /// Identifiers spelled `name` (case-insensitive), declaring and
    /// referencing occurrences alike
    pub fn find_identifiers<'a>(root: NodeRef<'a>, name: &str) -> Vec<QueryResult<'a>> {
        Self::find_all(root, |node| match node {
            NodeRef::Ident(ident) => ident.name.eq_ignore_ascii_case(name),
            _ => false,
        })
    }

    /// References bound to `decl`
    pub fn find_references_to<'a>(root: NodeRef<'a>, decl: DeclId) -> Vec<QueryResult<'a>> {
        Self::find_all(root, |node| match node {
            NodeRef::IdentRef(r) => r.resolved == Some(decl),
            _ => false,
        })
    }

    /// The declaring node carrying `id`
    pub fn find_node<'a>(root: NodeRef<'a>, id: NodeId) -> Option<QueryResult<'a>> {
        Self::find_first(root, |node| node.node_id() == Some(id))
    }

    /// Innermost node whose identifier span contains `position`
    pub fn find_at_position<'a>(root: NodeRef<'a>, position: Position) -> Option<QueryResult<'a>> {
        Self::find_all(root, |node| {
            node.ident_span().is_some_and(|span| span.contains(position))
        })
        .into_iter()
        .max_by_key(|result| result.path.len())
    }

    /// Every (parent path, child path) pair below `root`
    pub fn parent_child_pairs(root: NodeRef<'_>) -> Vec<(Vec<usize>, Vec<usize>)> {
        let mut pairs = Vec::new();
        let mut path = Vec::new();
        Self::collect_parent_child_pairs(root, &mut pairs, &mut path);
        pairs
    }

    /// Reference names that did not bind to any declaration
    pub fn unresolved_references<'a>(root: NodeRef<'a>) -> Vec<&'a IdentRef> {
        let mut refs = Vec::new();
        root.walk(&mut |node| {
            if let NodeRef::IdentRef(r) = node {
                if r.resolved.is_none() {
                    refs.push(r);
                }
            }
        });
        refs
    }

    fn find_all_recursive<'a, F>(
        node: NodeRef<'a>,
        predicate: &F,
        results: &mut Vec<QueryResult<'a>>,
        path: &mut Vec<usize>,
    ) where
        F: Fn(&NodeRef<'a>) -> bool,
    {
        if predicate(&node) {
            results.push(QueryResult {
                node,
                span: node.ident_span(),
                path: path.clone(),
            });
        }

        for (i, child) in node.children().into_iter().enumerate() {
            path.push(i);
            Self::find_all_recursive(child, predicate, results, path);
            path.pop();
        }
    }

    fn find_first_recursive<'a, F>(
        node: NodeRef<'a>,
        predicate: &F,
        path: &mut Vec<usize>,
    ) -> Option<QueryResult<'a>>
    where
        F: Fn(&NodeRef<'a>) -> bool,
    {
        if predicate(&node) {
            return Some(QueryResult {
                node,
                span: node.ident_span(),
                path: path.clone(),
            });
        }

        for (i, child) in node.children().into_iter().enumerate() {
            path.push(i);
            let found = Self::find_first_recursive(child, predicate, path);
            path.pop();
            if found.is_some() {
                return found;
            }
        }

        None
    }

    fn collect_parent_child_pairs(
        node: NodeRef<'_>,
        pairs: &mut Vec<(Vec<usize>, Vec<usize>)>,
        path: &mut Vec<usize>,
    ) {
        let parent_path = path.clone();
        for (i, child) in node.children().into_iter().enumerate() {
            let mut child_path = parent_path.clone();
            child_path.push(i);
            pairs.push((parent_path.clone(), child_path));

            path.push(i);
            Self::collect_parent_child_pairs(child, pairs, path);
            path.pop();
        }
    }
}

/// Name of the identifier a query result points at, when it is one
pub fn ident_name<'a>(result: &QueryResult<'a>) -> Option<&'a str> {
    match result.node {
        NodeRef::Ident(ident) => Some(ident.name.as_str()),
        NodeRef::IdentRef(r) => Some(r.name()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_program_source;
    use ast::Statement;

    const SOURCE: &str = r#"
program Test;
var x, y: Integer;

procedure Proc1;
var Local: Integer;
begin
  Local := x
end;

function Func1: Integer;
begin
  Func1 := y
end;

begin
  x := 1;
  y := x;
end.
"#;

    #[test]
    fn test_find_routines() {
        let parsed = parse_program_source(SOURCE).unwrap();
        let routines = AstQuery::find_routines(NodeRef::Program(&parsed.program));
        assert_eq!(routines.len(), 2);
        let names: Vec<_> = routines
            .iter()
            .map(|r| match r.node {
                NodeRef::RoutineDecl(d) => d.heading.ident.name.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, vec!["Proc1", "Func1"]);
    }

    #[test]
    fn test_find_variables() {
        let parsed = parse_program_source(SOURCE).unwrap();
        let vars = AstQuery::find_variables(NodeRef::Program(&parsed.program));
        // x, y at program level and Local inside Proc1
        assert_eq!(vars.len(), 2);
        assert!(vars[1].path.len() > vars[0].path.len());
    }

    #[test]
    fn test_find_identifiers() {
        let parsed = parse_program_source(SOURCE).unwrap();
        let x_refs = AstQuery::find_identifiers(NodeRef::Program(&parsed.program), "X");
        // Declaration plus three uses
        assert_eq!(x_refs.len(), 4);
        assert!(x_refs.iter().all(|r| ident_name(r) == Some("x")));
    }

    #[test]
    fn test_find_references_to_declaration() {
        let parsed = parse_program_source(SOURCE).unwrap();
        let root = NodeRef::Program(&parsed.program);
        let Statement::Assign { target, .. } = &parsed.program.block.block.body.statements[0] else {
            panic!("expected an assignment");
        };
        let x = target.root.resolved().unwrap();
        let refs = AstQuery::find_references_to(root, x);
        assert_eq!(refs.len(), 3);

        let decl = parsed.declaration(x);
        let node = decl.node.and_then(|id| AstQuery::find_node(root, id)).unwrap();
        assert!(matches!(node.node, NodeRef::VarDecl(_)));
        assert!(AstQuery::unresolved_references(root).is_empty());
    }

    #[test]
    fn test_find_at_position() {
        let parsed = parse_program_source("program P; var Alpha: Integer; begin Alpha := 2 end.").unwrap();
        let root = NodeRef::Program(&parsed.program);
        // Inside the second `Alpha`
        let hit = AstQuery::find_at_position(root, Position::new(1, 40, 39)).unwrap();
        assert!(matches!(hit.node, NodeRef::Ident(_)));
        assert_eq!(hit.span.map(|s| s.start.index), Some(37));
        assert!(AstQuery::find_at_position(root, Position::new(1, 500, 499)).is_none());
    }

    #[test]
    fn test_parent_child_pairs() {
        let parsed = parse_program_source("program P; begin end.").unwrap();
        let pairs = AstQuery::parent_child_pairs(NodeRef::Program(&parsed.program));
        // Program -> Ident, Program -> Block, Block -> Compound
        assert_eq!(
            pairs,
            vec![
                (vec![], vec![0]),
                (vec![], vec![1]),
                (vec![1], vec![1, 0]),
            ]
        );
        assert_eq!(AstQuery::find_by_kind(NodeRef::Program(&parsed.program), "Compound").len(), 1);
    }
}
