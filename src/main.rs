use std::fs;
use std::io::{self, Read};

use anyhow::Context;
use clap::{App, Arg};

use lumen::ast::{Item, ANON_FN_NAME};
use lumen::codegen::{Generate, Interpreter};
use lumen::lexer::{tokenize, Keyword, Token};
use lumen::parser::{OpTable, Parser};

fn main() -> anyhow::Result<()> {
    let matches = App::new("lumen")
        .about("front end and evaluator for the lumen expression language")
        .arg(Arg::with_name("input").help("source file to read (stdin when omitted)"))
        .arg(
            Arg::with_name("ast")
                .long("ast")
                .help("dump parsed top-level units instead of evaluating them"),
        )
        .arg(
            Arg::with_name("tokens")
                .long("tokens")
                .help("dump the token stream and exit"),
        )
        .get_matches();

    let source = match matches.value_of("input") {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    if matches.is_present("tokens") {
        for token in tokenize(&source)? {
            println!("{:?}", token);
        }
        return Ok(());
    }

    drive(&source, matches.is_present("ast"))
}

/// Top-level loop: dispatch on the lookahead, hand each completed unit to
/// the backend, and recover from syntax errors by skipping one token.
fn drive(source: &str, dump_ast: bool) -> anyhow::Result<()> {
    let mut parser = Parser::new(source, OpTable::default())?;
    let mut backend = Interpreter::new();

    while !parser.at_eof() {
        let item = match parser.current().clone() {
            // Top-level delimiter, nothing to parse.
            Token::Unknown(';') => {
                parser.advance()?;
                continue;
            }
            Token::Keyword(Keyword::Def) => parser.parse_definition().map(Item::Function),
            Token::Keyword(Keyword::Extern) => parser.parse_extern().map(Item::Extern),
            _ => parser.parse_top_level_expr().map(Item::Function),
        };

        let item = match item {
            Ok(item) => item,
            Err(err) => {
                eprintln!("Error: {}", err);
                // Skip the offending token and resume with the next unit.
                if let Err(err) = parser.advance() {
                    eprintln!("Error: {}", err);
                }
                continue;
            }
        };

        if dump_ast {
            println!("{:#?}", item);
            continue;
        }

        match &item {
            Item::Function(function) if function.proto.name == ANON_FN_NAME => {
                match backend.generate(&item) {
                    Ok(value) => println!("Evaluated to {}", value),
                    Err(err) => eprintln!("Error: {}", err),
                }
            }
            Item::Function(_) => {
                println!("Parsed a function definition.");
                if let Err(err) = backend.generate(&item) {
                    eprintln!("Error: {}", err);
                }
            }
            Item::Extern(_) => {
                println!("Parsed an extern.");
                if let Err(err) = backend.generate(&item) {
                    eprintln!("Error: {}", err);
                }
            }
        }
    }

    Ok(())
}
