//! Grammar assembly: the named-parser registry and the Tack productions.
//!
//! Rules live in a [`ParserDict`], a mutable registry of named parsers
//! resolved lazily via [`ParserDict::ref_parser`]. The indirection is what
//! lets mutually recursive rules (a quotation word references the general
//! `word` rule, which contains quotation words) terminate, and what lets
//! later registrations union new alternatives into existing rules with
//! [`ParserDict::alt_extend`].
//!
//! Every delimited production routes its interior through
//! [`recover`]/[`skip_until`] so an error inside the delimiters is
//! contained: the parser still consumes through the matching close and
//! splices a [`ParseErrorNode`] where the expected content would have
//! been.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tack_common::span::Position;
use tack_common::token::{Token, TokenKind};

use crate::ast::{
    AttributeWordNode, CastWordNode, ClassdefStatementNode, FuncdefStatementNode,
    ImportStatementNode, ListWordNode, NameWordNode, Node, NumberWordNode, ParseErrorNode,
    PushWordNode, QuoteWordNode, StringWordNode, TopLevelNode, TupleWordNode,
};
use crate::combinators::{
    alt, fail, peek, peek_prev, success, token, ParseError, Parser,
};
use crate::recovery::{recover, skip_until, Recovery};
use crate::typeexpr::{
    ForallTypeExpr, GenericTypeExpr, NamedTypeExpr, ObjectTypeExpr, StackEffectTypeExpr,
    TypeExprNode, TypeSequenceExpr, TypeSequenceItemExpr, VarTypeExpr,
};

// ── The registry ───────────────────────────────────────────────────────

/// A dictionary holding named references to parsers.
///
/// References can be indirect: adding a new alternative to a rule is
/// picked up by every parser that refers to it by name.
#[derive(Clone, Default)]
pub struct ParserDict {
    rules: Rc<RefCell<FxHashMap<String, Parser<Node>>>>,
}

impl ParserDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a rule.
    pub fn set(&self, name: &str, parser: Parser<Node>) {
        self.rules.borrow_mut().insert(name.to_string(), parser);
    }

    /// Union a new alternative into an existing rule (the `|=` of the
    /// registry). Creates the rule if it does not exist yet.
    pub fn alt_extend(&self, name: &str, parser: Parser<Node>) {
        let mut rules = self.rules.borrow_mut();
        let combined = match rules.remove(name) {
            Some(existing) => existing.or_else(parser),
            None => parser,
        };
        rules.insert(name.to_string(), combined);
    }

    /// A lazy, by-name reference to a rule. Resolution happens when the
    /// returned parser runs, so forward references are fine.
    pub fn ref_parser(&self, name: &str) -> Parser<Node> {
        let rules = Rc::clone(&self.rules);
        let name = name.to_string();
        Parser::new(move |stream, index| {
            let rule = rules.borrow().get(&name).cloned();
            match rule {
                Some(rule) => rule.run(stream, index),
                None => fail::<Node>(format!("known grammar rule `{name}`")).run(stream, index),
            }
        })
    }

    /// Apply a grammar extension to this registry.
    pub fn extend_with(&self, extension: impl FnOnce(&ParserDict)) {
        extension(self);
    }

    /// Parse a whole token stream with the `top-level` rule.
    pub fn parse(&self, tokens: &[Token]) -> Result<TopLevelNode, ParseError> {
        let node = self.ref_parser("top-level").parse(tokens)?;
        match node {
            Node::TopLevel(top) => Ok(top),
            _ => unreachable!("the top-level rule produces a top-level node"),
        }
    }
}

fn as_type(node: Node) -> TypeExprNode {
    match node {
        Node::TypeExpr(ty) => ty,
        _ => unreachable!("type rules produce type expressions"),
    }
}

// ── Grammar ────────────────────────────────────────────────────────────

/// Build the full Tack grammar.
pub fn build_parsers() -> ParserDict {
    let parsers = ParserDict::new();
    parsers.extend_with(word_extension);
    parsers.extend_with(statement_extension);
    parsers.extend_with(type_extension);
    parsers.extend_with(top_level_extension);
    parsers
}

/// A sequence of program items: words, statements, and blank lines.
///
/// Each item attempt is wrapped in line-level recovery: when no rule
/// matches, the rest of the line is skipped and an explicit
/// [`ParseErrorNode`] carrying the rule failure takes the item's place, so
/// one bad line never takes the rest of the file down with it.
fn program_items(parsers: &ParserDict) -> Parser<Vec<Node>> {
    let statement = parsers
        .ref_parser("statement")
        .skip(token(TokenKind::Newline).optional())
        .map(Some);
    let word = parsers.ref_parser("word").map(Some);
    let blank = token(TokenKind::Newline).map(|_| None);
    let item_core = alt(vec![statement, word, blank]);
    let item = recover(item_core, skip_rest_of_line()).map(|recovery| match recovery {
        Recovery::Ok(item) => item,
        Recovery::Recovered {
            fallback_output,
            failure,
            ..
        } => {
            let at = fallback_output
                .first()
                .map(Token::start)
                .unwrap_or_else(Position::start_of_file);
            Some(Node::ParseError(ParseErrorNode::new(
                failure,
                fallback_output,
                at,
            )))
        }
    });
    item.many()
        .map(|items| items.into_iter().flatten().collect())
}

/// Consume at least one token, through to the end of the current line,
/// stopping before layout boundaries. Fails when already at a boundary so
/// enclosing repetition terminates.
fn skip_rest_of_line() -> Parser<Vec<Token>> {
    use crate::combinators::{FailureTree, ParseOutcome};
    fn is_boundary(token: &Token) -> bool {
        matches!(
            token.kind,
            TokenKind::Newline | TokenKind::Dedent | TokenKind::EndMarker
        )
    }
    Parser::new(|stream, start| {
        if start >= stream.len() || is_boundary(&stream[start]) {
            return ParseOutcome::failure(
                start,
                FailureTree::new("anything to skip", start, vec![]),
            );
        }
        let mut index = start + 1;
        while index < stream.len() && !is_boundary(&stream[index]) {
            index += 1;
        }
        ParseOutcome::success(stream[start..index].to_vec(), index, None)
    })
}

fn top_level_extension(parsers: &ParserDict) {
    let top_level = program_items(parsers)
        .then(token(TokenKind::EndMarker))
        .map(|(children, end)| {
            let location = children
                .first()
                .map(Node::location)
                .unwrap_or_else(Position::start_of_file);
            Node::TopLevel(TopLevelNode {
                location,
                end_location: end.end(),
                children,
            })
        });
    parsers.set("top-level", top_level.desc("program"));
}

/// A statement suite: words on the same line, or an indented block.
///
/// The indented block is a bracketed region between `Indent` and `Dedent`,
/// so a syntax error inside a body is contained at the `Dedent`
/// synchronization point.
fn suite(parsers: &ParserDict) -> Parser<Vec<Node>> {
    let inline = parsers
        .ref_parser("word")
        .at_least(1)
        .skip(peek(token(TokenKind::Newline)));
    let items = program_items(parsers);
    let block_inside = items.skip(peek(token(TokenKind::Dedent)));
    let block = token(TokenKind::Newline)
        .keep(token(TokenKind::Indent))
        .then(recover(block_inside, skip_until(token(TokenKind::Dedent))))
        .skip(token(TokenKind::Dedent))
        .map(|(indent, recovery)| match recovery {
            Recovery::Ok(children) => children,
            Recovery::Recovered {
                fallback_output,
                failure,
                ..
            } => vec![Node::ParseError(ParseErrorNode::new(
                failure,
                fallback_output,
                indent.end(),
            ))],
        });
    inline.or_else(block).desc("statement suite")
}

fn statement_extension(parsers: &ParserDict) {
    // import a.b.c [as name]
    let dotted_name = token(TokenKind::Name)
        .sep_by(token(TokenKind::Dot), 1, None)
        .map(|parts| {
            let start = parts.first().map(Token::start);
            let end = parts.last().map(Token::end);
            let name = parts
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(".");
            (name, start, end)
        });
    let asname = token(TokenKind::As)
        .keep(token(TokenKind::Name))
        .optional();

    let import = token(TokenKind::Import)
        .then(dotted_name.clone())
        .then(asname.clone())
        .map(|((kw, (module, _, end)), alias)| {
            let end_location = alias
                .as_ref()
                .map(Token::end)
                .or(end)
                .unwrap_or_else(|| kw.end());
            Node::Import(ImportStatementNode {
                module,
                imported_name: None,
                asname: alias.map(|t| t.text),
                location: kw.start(),
                end_location,
            })
        })
        .desc("import statement");

    // from a.b import name [as alias]
    let from_import = token(TokenKind::From)
        .then(dotted_name)
        .skip(token(TokenKind::Import))
        .then(token(TokenKind::Name))
        .then(asname)
        .map(|(((kw, (module, _, _)), imported), alias)| {
            let end_location = alias.as_ref().map(Token::end).unwrap_or_else(|| imported.end());
            Node::Import(ImportStatementNode {
                module,
                imported_name: Some(imported.text),
                asname: alias.map(|t| t.text),
                location: kw.start(),
                end_location,
            })
        })
        .desc("from-import statement");

    parsers.set("import-statement", from_import.or_else(import));

    // def name (effect): suite
    let funcdef = {
        let parsers = parsers.clone();
        token(TokenKind::Def)
            .then(token(TokenKind::Name))
            .then(parsers.ref_parser("stack-effect-type"))
            .skip(token(TokenKind::Colon))
            .bind(move |((kw, name), effect)| {
                suite(&parsers).map(move |body| {
                    let effect = match as_type(effect.clone()) {
                        TypeExprNode::StackEffect(se) => se,
                        _ => unreachable!("the stack-effect-type rule produces stack effects"),
                    };
                    let end_location = body
                        .last()
                        .map(Node::end_location)
                        .unwrap_or(effect.end_location);
                    Node::Funcdef(FuncdefStatementNode {
                        name: name.text.clone(),
                        effect,
                        body,
                        location: kw.start(),
                        end_location,
                    })
                })
            })
            .desc("function definition")
    };
    parsers.set("funcdef-statement", funcdef);

    // class name[params]: suite
    let classdef = {
        let parsers = parsers.clone();
        let type_params_inside = parsers
            .ref_parser("type-variable")
            .sep_by(token(TokenKind::Comma), 1, None)
            .skip(peek(token(TokenKind::RSqb)));
        let type_params = token(TokenKind::LSqb)
            .then(recover(
                type_params_inside,
                skip_until(token(TokenKind::RSqb)),
            ))
            .skip(token(TokenKind::RSqb))
            .map(|(lsqb, recovery)| match recovery {
                Recovery::Ok(params) => params.into_iter().map(as_type).collect(),
                Recovery::Recovered {
                    fallback_output,
                    failure,
                    ..
                } => vec![TypeExprNode::Error(Box::new(ParseErrorNode::new(
                    failure,
                    fallback_output,
                    lsqb.end(),
                )))],
            })
            .optional()
            .map(|params| params.unwrap_or_default());
        token(TokenKind::Class)
            .then(token(TokenKind::Name))
            .then(type_params)
            .skip(token(TokenKind::Colon))
            .bind(move |((kw, name), type_parameters)| {
                suite(&parsers).map(move |body| {
                    let end_location = body
                        .last()
                        .map(Node::end_location)
                        .unwrap_or_else(|| name.end());
                    Node::Classdef(ClassdefStatementNode {
                        name: name.text.clone(),
                        type_parameters: type_parameters.clone(),
                        body,
                        location: kw.start(),
                        end_location,
                    })
                })
            })
            .desc("class definition")
    };
    parsers.set("classdef-statement", classdef);

    parsers.set("statement", parsers.ref_parser("import-statement"));
    parsers.alt_extend("statement", parsers.ref_parser("funcdef-statement"));
    parsers.alt_extend("statement", parsers.ref_parser("classdef-statement"));
}

fn word_extension(parsers: &ParserDict) {
    // Literals.
    let number_word = token(TokenKind::Number).bind(|t| match t.text.parse::<i64>() {
        Ok(value) => success(Node::Number(NumberWordNode {
            value,
            location: t.start(),
            end_location: t.end(),
        })),
        Err(_) => fail("integer literal"),
    });
    parsers.set("number-word", number_word);

    let string_word = token(TokenKind::Str).map(|t| {
        let value = strip_quotes(&t.text);
        Node::Str(StringWordNode {
            value,
            location: t.start(),
            end_location: t.end(),
        })
    });
    parsers.set("string-word", string_word);

    parsers.set(
        "literal-word",
        parsers
            .ref_parser("number-word")
            .or_else(parsers.ref_parser("string-word")),
    );

    parsers.set(
        "name-word",
        token(TokenKind::Name).map(|t| Node::Name(NameWordNode::from_token(&t))),
    );

    let attribute_word = token(TokenKind::Dot)
        .then(token(TokenKind::Name))
        .map(|(dot, name)| {
            let end_location = name.end();
            Node::Attribute(AttributeWordNode {
                value: name.text,
                location: dot.start(),
                end_location,
            })
        });
    parsers.set("attribute-word", attribute_word);

    // $word -- push instead of execute.
    let push_word = token(TokenKind::Dollar)
        .then(parsers.ref_parser("word"))
        .map(|(dollar, child)| {
            Node::Push(PushWordNode {
                location: dollar.start(),
                end_location: child.end_location(),
                child: Box::new(child),
            })
        });
    parsers.set("push-word", push_word);

    // (words...) -- a quotation, with recovery at the closing paren.
    let quote_inside = parsers
        .ref_parser("word")
        .many()
        .skip(peek(token(TokenKind::RPar)));
    let quote_word = token(TokenKind::LPar)
        .then(recover(quote_inside, skip_until(token(TokenKind::RPar))))
        .then(token(TokenKind::RPar))
        .map(|((lpar, recovery), rpar)| {
            let children = match recovery {
                Recovery::Ok(words) => words,
                Recovery::Recovered {
                    fallback_output,
                    failure,
                    ..
                } => vec![Node::ParseError(ParseErrorNode::new(
                    failure,
                    fallback_output,
                    lpar.end(),
                ))],
            };
            Node::Quote(QuoteWordNode {
                children,
                input_stack_type: None,
                location: lpar.start(),
                end_location: rpar.end(),
            })
        })
        .desc("quotation");
    parsers.set("quote-word", quote_word);

    // (e1, e2, ...) -- at least one comma distinguishes a tuple from a
    // quotation. Kept strict: a malformed interior falls back to the
    // quotation rule's recovery.
    let element = parsers.ref_parser("word").many();
    let tuple_word = token(TokenKind::LPar)
        .then(element.clone())
        .then(
            token(TokenKind::Comma)
                .keep(element.clone())
                .at_least(1),
        )
        .then(token(TokenKind::RPar))
        .map(|(((lpar, first), rest), rpar)| {
            let mut elements = vec![first];
            elements.extend(rest);
            // A trailing comma leaves an empty element; drop it.
            elements.retain(|element| !element.is_empty());
            Node::Tuple(TupleWordNode {
                elements,
                location: lpar.start(),
                end_location: rpar.end(),
            })
        })
        .desc("tuple word");
    parsers.set("tuple-word", tuple_word);

    // [e1, e2, ...] -- with recovery at the closing bracket.
    let list_inside = element
        .sep_by(token(TokenKind::Comma), 0, None)
        .skip(peek(token(TokenKind::RSqb)));
    let list_word = token(TokenKind::LSqb)
        .then(recover(list_inside, skip_until(token(TokenKind::RSqb))))
        .then(token(TokenKind::RSqb))
        .map(|((lsqb, recovery), rsqb)| {
            let mut elements = match recovery {
                Recovery::Ok(elements) => elements,
                Recovery::Recovered {
                    fallback_output,
                    failure,
                    ..
                } => vec![vec![Node::ParseError(ParseErrorNode::new(
                    failure,
                    fallback_output,
                    lsqb.end(),
                ))]],
            };
            // `[]` and trailing commas leave empty elements; drop them.
            elements.retain(|element| !element.is_empty());
            Node::List(ListWordNode {
                elements,
                location: lsqb.start(),
                end_location: rsqb.end(),
            })
        })
        .desc("list word");
    parsers.set("list-word", list_word);

    // cast (type) -- with recovery inside the parentheses.
    let cast_type = recover(
        parsers.ref_parser("type").map(as_type),
        skip_until(token(TokenKind::RPar)),
    );
    let cast_word = token(TokenKind::Cast)
        .then(token(TokenKind::LPar))
        .then(cast_type)
        .then(token(TokenKind::RPar))
        .map(|(((kw, lpar), recovery), rpar)| {
            let ty = match recovery {
                Recovery::Ok(ty) => ty,
                Recovery::Recovered {
                    fallback_output,
                    failure,
                    ..
                } => TypeExprNode::Error(Box::new(ParseErrorNode::new(
                    failure,
                    fallback_output,
                    lpar.end(),
                ))),
            };
            Node::Cast(CastWordNode {
                ty,
                location: kw.start(),
                end_location: rpar.end(),
            })
        })
        .desc("cast word");
    parsers.set("cast-word", cast_word);

    parsers.set(
        "word",
        alt(vec![
            parsers.ref_parser("push-word"),
            parsers.ref_parser("cast-word"),
            parsers.ref_parser("list-word"),
            parsers.ref_parser("tuple-word"),
            parsers.ref_parser("quote-word"),
            parsers.ref_parser("literal-word"),
            parsers.ref_parser("name-word"),
            parsers.ref_parser("attribute-word"),
        ]),
    );
}

fn strip_quotes(text: &str) -> String {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return text[1..text.len() - 1].to_string();
        }
    }
    text.to_string()
}

// ── The type-annotation grammar ────────────────────────────────────────

fn type_extension(parsers: &ParserDict) {
    // `name -- an item type variable.
    let item_var = token(TokenKind::Backtick)
        .then(token(TokenKind::Name))
        .map(|(tick, name)| {
            let end_location = name.end();
            Node::TypeExpr(TypeExprNode::ItemVar(VarTypeExpr {
                name: name.text,
                location: tick.start(),
                end_location,
            }))
        });
    parsers.set("item-type-variable", item_var);

    // *name -- a sequence ("rest of the stack") type variable.
    let seq_var = token(TokenKind::Star)
        .then(token(TokenKind::Name))
        .map(|(star, name)| {
            let end_location = name.end();
            Node::TypeExpr(TypeExprNode::SeqVar(VarTypeExpr {
                name: name.text,
                location: star.start(),
                end_location,
            }))
        });
    parsers.set("sequence-type-variable", seq_var);

    parsers.set(
        "type-variable",
        parsers
            .ref_parser("sequence-type-variable")
            .or_else(parsers.ref_parser("item-type-variable")),
    );

    let named_type = token(TokenKind::Name).map(|t| {
        Node::TypeExpr(TypeExprNode::Named(NamedTypeExpr {
            name: t.text.clone(),
            location: t.start(),
            end_location: t.end(),
        }))
    });

    // name or name[args...], with recovery inside the brackets.
    let generic_args_inside = parsers
        .ref_parser("type")
        .sep_by(token(TokenKind::Comma), 1, None)
        .skip(peek(token(TokenKind::RSqb)));
    let generic_suffix = token(TokenKind::LSqb)
        .then(recover(
            generic_args_inside,
            skip_until(token(TokenKind::RSqb)),
        ))
        .then(token(TokenKind::RSqb));
    let parameterized_type = named_type
        .then(generic_suffix.optional())
        .map(|(head, suffix)| {
            let head = as_type(head);
            match suffix {
                None => Node::TypeExpr(head),
                Some(((lsqb, recovery), rsqb)) => {
                    let arguments = match recovery {
                        Recovery::Ok(args) => args.into_iter().map(as_type).collect(),
                        Recovery::Recovered {
                            fallback_output,
                            failure,
                            ..
                        } => vec![TypeExprNode::Error(Box::new(ParseErrorNode::new(
                            failure,
                            fallback_output,
                            lsqb.end(),
                        )))],
                    };
                    let location = head.location();
                    Node::TypeExpr(TypeExprNode::Generic(GenericTypeExpr {
                        head: Box::new(head),
                        arguments,
                        location,
                        end_location: rsqb.end(),
                    }))
                }
            }
        })
        .desc("named type or generic type");
    parsers.set("named-type", parameterized_type);

    // A stack-effect sequence: [*seq] (name[:type])*.
    let effect_item = token(TokenKind::Name)
        .then(
            token(TokenKind::Colon)
                .keep(parsers.ref_parser("type"))
                .optional(),
        )
        .map(|(name, ty)| {
            let ty = ty.map(as_type);
            let end_location = ty
                .as_ref()
                .map(TypeExprNode::end_location)
                .unwrap_or_else(|| name.end());
            let location = name.start();
            TypeSequenceItemExpr {
                name: Some(name.text),
                ty,
                location,
                end_location,
            }
        });
    let effect_sequence = sequence_of(parsers, effect_item);
    parsers.set(
        "stack-effect-type-sequence",
        effect_sequence
            .clone()
            .map(|seq| Node::TypeExpr(TypeExprNode::Sequence(seq))),
    );

    // A plain type sequence: [*seq] type*.
    let sequence_item = parsers.ref_parser("type").map(|node| {
        let ty = as_type(node);
        TypeSequenceItemExpr {
            name: None,
            location: ty.location(),
            end_location: ty.end_location(),
            ty: Some(ty),
        }
    });
    let type_sequence = sequence_of(parsers, sequence_item);
    parsers.set(
        "type-sequence",
        type_sequence
            .clone()
            .map(|seq| Node::TypeExpr(TypeExprNode::Sequence(seq)))
            .desc("type sequence"),
    );

    // (input -- output)
    let stack_effect = token(TokenKind::LPar)
        .then(effect_sequence.clone())
        .skip(token(TokenKind::DashDash))
        .then(effect_sequence)
        .then(token(TokenKind::RPar))
        .map(|(((lpar, input), output), rpar)| {
            Node::TypeExpr(TypeExprNode::StackEffect(StackEffectTypeExpr {
                input,
                output,
                location: lpar.start(),
                end_location: rpar.end(),
            }))
        });
    parsers.set("stack-effect-type", stack_effect.desc("stack effect type"));

    // {name: type, ...}
    let attribute_pair = token(TokenKind::Name)
        .skip(token(TokenKind::Colon))
        .then(parsers.ref_parser("type"))
        .map(|(name, ty)| (name.text, as_type(ty)));
    let object_type = token(TokenKind::LBrace)
        .then(attribute_pair.sep_by(token(TokenKind::Comma), 0, None))
        .then(token(TokenKind::RBrace))
        .map(|((lbrace, attributes), rbrace)| {
            Node::TypeExpr(TypeExprNode::Object(ObjectTypeExpr {
                attributes,
                location: lbrace.start(),
                end_location: rbrace.end(),
            }))
        })
        .desc("object type");
    parsers.set("object-type", object_type);

    // forall `a *s. type
    let forall_type = {
        let parsers = parsers.clone();
        token(TokenKind::Name)
            .bind(|t| {
                if t.text == "forall" {
                    success(t)
                } else {
                    fail("the word `forall`")
                }
            })
            .then(parsers.ref_parser("type-variable").at_least(1))
            .skip(token(TokenKind::Dot))
            .then(parsers.ref_parser("type"))
            .map(|((kw, variables), body)| {
                let body = as_type(body);
                let end_location = body.end_location();
                Node::TypeExpr(TypeExprNode::Forall(ForallTypeExpr {
                    variables: variables.into_iter().map(as_type).collect(),
                    body: Box::new(body),
                    location: kw.start(),
                    end_location,
                }))
            })
            .desc("forall type")
    };
    parsers.set("forall-type", forall_type);

    let individual_type = alt(vec![
        parsers.ref_parser("named-type"),
        parsers.ref_parser("stack-effect-type"),
        parsers.ref_parser("object-type"),
        parsers.ref_parser("item-type-variable"),
    ])
    .desc("individual type");

    let parenthesized_sequence = token(TokenKind::LPar)
        .keep(parsers.ref_parser("type-sequence"))
        .skip(token(TokenKind::RPar));

    parsers.set(
        "type",
        alt(vec![
            parsers.ref_parser("forall-type"),
            individual_type,
            parenthesized_sequence,
            parsers.ref_parser("sequence-type-variable"),
        ]),
    );
}

/// Shared shape of the two sequence rules: an optional sequence variable
/// followed by items, with the original's span bookkeeping for empty
/// sequences (fall back to the previous token, then to the start of the
/// file).
fn sequence_of(
    parsers: &ParserDict,
    item: Parser<TypeSequenceItemExpr>,
) -> Parser<TypeSequenceExpr> {
    let seq_var = parsers
        .ref_parser("sequence-type-variable")
        .map(|node| match as_type(node) {
            TypeExprNode::SeqVar(v) => v,
            _ => unreachable!("the sequence-type-variable rule produces sequence variables"),
        });
    seq_var
        .optional()
        .then(item.many())
        .then(peek_prev().optional())
        .map(|((sequence_variable, items), prev)| {
            let location = sequence_variable
                .as_ref()
                .map(|v| v.location)
                .or_else(|| items.first().map(|i| i.location))
                .or_else(|| prev.as_ref().map(Token::end))
                .unwrap_or_else(Position::start_of_file);
            let end_location = items
                .last()
                .map(|i| i.end_location)
                .or_else(|| sequence_variable.as_ref().map(|v| v.end_location))
                .unwrap_or(location);
            TypeSequenceExpr {
                sequence_variable,
                items,
                location,
                end_location,
            }
        })
}
