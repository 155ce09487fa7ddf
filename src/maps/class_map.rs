/* redex-class-rename-map.txt: ProGuard style rename map */

use std::fs;
use std::path::Path;

use log::{error, info};
use nom::bytes::complete::{tag, take_till, take_until};
use nom::character::complete::{char, not_line_ending};
use nom::combinator::opt;
use nom::sequence::{separated_pair, terminated};
use nom::IResult;

use crate::maps::error::MapError;
use crate::types::{ClassMap, ClassMemberMapping};

#[derive(Debug, PartialEq, Eq)]
enum MappingLine<'a>
{
    /// `original.Class -> obf.A:`
    Class { original: &'a str, obfuscated: &'a str },
    /// `    int field -> a` or `    void method(int) -> b`
    Member { original: &'a str, obfuscated: &'a str },
}

fn arrow(i: &str) -> IResult<&str, (&str, &str)>
{
    separated_pair(take_until(" -> "), tag(" -> "), not_line_ending)(i)
}

fn class_target(i: &str) -> IResult<&str, &str>
{
    terminated(take_till(|c: char| c == ':'), opt(char(':')))(i)
}

fn parse_mapping_line(i: &str) -> IResult<&str, MappingLine<'_>>
{
    let (rest, (original, new)) = arrow(i)?;
    if original.starts_with(' ') || original.starts_with('\t')
    {
        return Ok((rest, MappingLine::Member { original: original.trim(), obfuscated: new.trim() }));
    }
    let (_, obfuscated) = class_target(new.trim())?;
    Ok((rest, MappingLine::Class { original, obfuscated }))
}

/// Name of a method from its declaration, `void foo(int)` -> `foo`.
fn method_name(original: &str) -> IResult<&str, &str>
{
    let (rest, decl) = declaration(original)?;
    Ok((rest, decl.split_whitespace().last().unwrap_or(decl)))
}

fn declaration(i: &str) -> IResult<&str, &str>
{
    take_till(|c: char| c == '(')(i)
}

fn is_method(original: &str) -> bool
{
    original.contains('(') && original.ends_with(')')
}

/// Parses a rename map from text, keyed by obfuscated dotted class name.
pub fn parse_class_map(text: &str) -> ClassMap
{
    let mut mapping = ClassMap::new();
    let mut current_class: Option<String> = None;

    for line in text.lines()
    {
        let parsed = match parse_mapping_line(line)
        {
            Ok((_, parsed)) => parsed,
            Err(_) => continue,
        };
        match parsed
        {
            MappingLine::Class { original, obfuscated } =>
            {
                mapping.insert(obfuscated.to_string(), ClassMemberMapping::new(original));
                current_class = Some(obfuscated.to_string());
            }
            MappingLine::Member { original, obfuscated } =>
            {
                let record = match current_class.as_ref().and_then(|c| mapping.get_mut(c))
                {
                    Some(record) => record,
                    None =>
                    {
                        error!(
                            "The member {} , obfuscated as {} does not belong to any class!",
                            original, obfuscated
                        );
                        continue;
                    }
                };
                if is_method(original)
                {
                    if let Ok((_, name)) = method_name(original)
                    {
                        record.method_mapping.insert(obfuscated.to_string(), name.to_string());
                    }
                }
                else if let Some(name) = original.split_whitespace().last()
                {
                    record.field_mapping.insert(obfuscated.to_string(), name.to_string());
                }
            }
        }
    }
    mapping
}

pub fn read_class_map(path: &Path) -> Result<ClassMap, MapError>
{
    let text = fs::read_to_string(path).map_err(|e| err!("Unable to read class map {}: {}", path.display(), e))?;
    let mapping = parse_class_map(&text);
    info!("Unpacked {} classes from class map", mapping.len());
    Ok(mapping)
}
