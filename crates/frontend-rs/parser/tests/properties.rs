//! Property-based tests for the parser.
//!
//! Programs are generated as token lists and rendered with different
//! layouts between the tokens.

use ast::ClearLocations;
use parser::parse_program_source;
use proptest::prelude::*;

const NAMES: [&str; 4] = ["Alpha", "Beta", "Gamma", "Delta"];

/// Trivia placed between two tokens
fn separator() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        " ",
        "\n",
        "\t ",
        "  { note }  ",
        " (* block *) ",
        " // line\n",
        "\r\n\r\n",
        " {$R+} ",
    ])
}

/// `target := source [+ n]` as tokens
fn assignment() -> impl Strategy<Value = Vec<String>> {
    (0..NAMES.len(), 0..NAMES.len(), prop::option::of(0u32..1000)).prop_map(|(target, source, add)| {
        let mut tokens = vec![NAMES[target].to_string(), ":=".to_string(), NAMES[source].to_string()];
        if let Some(n) = add {
            tokens.push("+".to_string());
            tokens.push(n.to_string());
        }
        tokens
    })
}

fn program_tokens() -> impl Strategy<Value = Vec<String>> {
    (1..=NAMES.len(), prop::collection::vec(assignment(), 0..8)).prop_map(|(declared, body)| {
        let mut tokens: Vec<String> = ["program", "Gen", ";", "var"].iter().map(|s| s.to_string()).collect();
        for (i, name) in NAMES.iter().take(declared).enumerate() {
            if i > 0 {
                tokens.push(",".to_string());
            }
            tokens.push(name.to_string());
        }
        tokens.extend([":", "Integer", ";", "begin"].iter().map(|s| s.to_string()));
        for (i, statement) in body.into_iter().enumerate() {
            if i > 0 {
                tokens.push(";".to_string());
            }
            tokens.extend(statement);
        }
        tokens.push("end".to_string());
        tokens.push(".".to_string());
        tokens
    })
}

/// Tokens with a matching list of separators
fn program_with_layout() -> impl Strategy<Value = (Vec<String>, Vec<&'static str>)> {
    program_tokens().prop_flat_map(|tokens| {
        let gaps = tokens.len();
        (Just(tokens), prop::collection::vec(separator(), gaps))
    })
}

fn render(tokens: &[String], gaps: &[&str]) -> String {
    tokens
        .iter()
        .zip(gaps)
        .map(|(token, gap)| format!("{}{}", token, gap))
        .collect()
}

proptest! {
    /// Parsing is a pure function of the source text.
    #[test]
    fn prop_parse_is_deterministic(tokens in program_tokens()) {
        let source = tokens.join(" ");
        let first = parse_program_source(&source).unwrap();
        let second = parse_program_source(&source).unwrap();

        prop_assert_eq!(
            serde_json::to_string(&first.program).unwrap(),
            serde_json::to_string(&second.program).unwrap()
        );
        prop_assert_eq!(&first.diagnostics, &second.diagnostics);
        prop_assert_eq!(first.declarations.len(), second.declarations.len());
    }

    /// Whitespace and comments change locations only.
    #[test]
    fn prop_layout_does_not_change_tree((tokens, gaps) in program_with_layout()) {
        let compact = tokens.join(" ");
        let spaced = render(&tokens, &gaps);

        let mut a = parse_program_source(&compact).unwrap();
        let mut b = parse_program_source(&spaced).unwrap();

        let messages = |d: &[errors::Diagnostic]| d.iter().map(|d| d.message.clone()).collect::<Vec<_>>();
        prop_assert_eq!(messages(&a.diagnostics), messages(&b.diagnostics));

        a.program.clear_locations();
        b.program.clear_locations();
        prop_assert_eq!(&a.program, &b.program);
    }

    /// Undeclared names are reported, declared ones are not.
    #[test]
    fn prop_only_undeclared_names_are_reported(tokens in program_tokens()) {
        let source = tokens.join(" ");
        let parsed = parse_program_source(&source).unwrap();
        let declared = tokens.iter().position(|t| t == ":").unwrap();
        let declared: Vec<&String> = tokens[4..declared].iter().filter(|t| *t != ",").collect();

        for diagnostic in &parsed.diagnostics {
            let name = diagnostic.name.clone().unwrap_or_default();
            prop_assert!(!declared.contains(&&name), "{} is declared", name);
        }
        let undeclared = tokens
            .iter()
            .skip_while(|t| *t != "begin")
            .filter(|t| NAMES.contains(&t.as_str()) && !declared.contains(t))
            .count();
        prop_assert_eq!(parsed.diagnostics.len(), undeclared);
    }
}
