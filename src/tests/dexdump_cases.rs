use std::collections::{BTreeMap, HashMap};

use crate::maps::debug_line_map::{DebugLineMap, OffsetLine};
use crate::maps::iodi::IodiMetadata;
use crate::maps::line_map::PositionMap;
use crate::symbolicate::{DexdumpSymbolicator, Symbolicated};
use crate::types::{ClassMap, ClassMemberMapping, PseudoPosition, SymbolicatorError};
use crate::SymbolMaps;

fn class_map() -> ClassMap {
    let mut record = ClassMemberMapping::new("x.y.Z");
    record.method_mapping.insert("foo".to_string(), "bar".to_string());
    record.field_mapping.insert("a".to_string(), "count".to_string());
    let mut map = ClassMap::new();
    map.insert("a.b.C".to_string(), record);
    map
}

// 0: Foo.java:10, 1: Bar.java:3 inlined into 0, 2: Foo.java:20, 3: Foo.java:21
fn position_map() -> PositionMap {
    let mut pmap = PositionMap::new();
    pmap.push_position(Some("x.y.Z.outer"), "Foo.java", 10, 0);
    pmap.push_position(Some("x.y.Bar.inner"), "Bar.java", 3, 1);
    pmap.push_position(Some("x.y.Z.bar"), "Foo.java", 20, 0);
    pmap.push_position(Some("x.y.Z.bar"), "Foo.java", 21, 0);
    pmap
}

fn pseudo(pmap: &mut PositionMap, kind: PseudoPosition, operand: u32, parent: u32) -> u32 {
    pmap.push_position(Some(kind.as_method()), "", operand, parent)
}

fn iodi_maps() -> SymbolMaps {
    let mut debug_lines = HashMap::new();
    debug_lines.insert(7, vec![OffsetLine { offset: 0, line: 3 }, OffsetLine { offset: 4, line: 4 }]);
    debug_lines.insert(8, vec![OffsetLine { offset: 2, line: 1 }, OffsetLine { offset: 6, line: 2 }]);
    let mut entries = BTreeMap::new();
    entries.insert("a.b.C.foo".to_string(), 7);
    entries.insert("a.b.C.baz".to_string(), 8);
    SymbolMaps::new(class_map(), position_map())
        .with_iodi(DebugLineMap::new(debug_lines), IodiMetadata::new(entries))
}

fn line(out: Symbolicated) -> String {
    match out {
        Symbolicated::Line(line) => line,
        other => panic!("expected a single line, got {:?}", other),
    }
}

fn feed(symbolicator: &mut DexdumpSymbolicator<'_>, lines: &[&str]) -> Vec<Symbolicated> {
    lines.iter().map(|l| symbolicator.symbolicate(l).unwrap()).collect()
}

#[test]
fn unrecognized_lines_pass_through() {
    let maps = SymbolMaps::new(class_map(), position_map());
    let mut s = DexdumpSymbolicator::new(&maps, false);
    for input in ["Opened 'classes.dex', DEX version '035'\n", "      registers     : 3\n", "\n"] {
        assert_eq!(line(s.symbolicate(input).unwrap()), input);
    }
}

#[test]
fn class_descriptors_renamed() {
    let maps = SymbolMaps::new(class_map(), position_map());
    let mut s = DexdumpSymbolicator::new(&maps, false);
    assert_eq!(
        line(s.symbolicate("  Class descriptor  : 'La/b/C;'\n").unwrap()),
        "  Class descriptor  : 'Lx/y/Z;'\n"
    );
    assert_eq!(
        line(s.symbolicate("  Superclass        : 'Lq/r/S;'\n").unwrap()),
        "  Superclass        : 'Lq/r/S;'\n"
    );
    assert_eq!(
        line(s.symbolicate("      type          : '(La/b/C;Lq/r/S;)V'\n").unwrap()),
        "      type          : '(Lx/y/Z;Lq/r/S;)V'\n"
    );
}

#[test]
fn line_annotations_decoded_without_iodi() {
    let maps = SymbolMaps::new(class_map(), position_map());
    let mut s = DexdumpSymbolicator::new(&maps, false);
    assert_eq!(
        line(s.symbolicate("        0x0000 line=2\n").unwrap()),
        "        0x0000 line=Bar.java:3, Foo.java:10\n"
    );
    // no IODI: repeats are never suppressed
    assert_eq!(
        line(s.symbolicate("        0x0003 line=2\n").unwrap()),
        "        0x0003 line=Bar.java:3, Foo.java:10\n"
    );
    // out of range decodes to nothing
    assert_eq!(line(s.symbolicate("        0x0005 line=99\n").unwrap()), "        0x0005 line=\n");

    let mut verbose = DexdumpSymbolicator::new(&maps, true);
    assert_eq!(
        line(verbose.symbolicate("        0x0000 line=1\n").unwrap()),
        "        0x0000 line=1 (Foo.java:10)\n"
    );
}

#[test]
fn member_names_ignored_without_iodi() {
    let maps = SymbolMaps::new(class_map(), position_map());
    let mut s = DexdumpSymbolicator::new(&maps, false);
    let out = feed(
        &mut s,
        &["Class #0            -\n", "  Direct methods    -\n", "    #0              : (in La/b/C;)\n", "      name          : 'foo'\n"],
    );
    assert_eq!(out[3], Symbolicated::Line("      name          : 'foo'\n".to_string()));
    assert_eq!(s.current_class(), None);
}

#[test]
fn switch_positions_decoded() {
    let mut pmap = PositionMap::new();
    for line in 0..5 {
        pmap.push_position(Some("a.B.c"), "F.java", 100 + line, 0);
    }
    pseudo(&mut pmap, PseudoPosition::Switch, 10, 0);
    for line in 6..10 {
        pmap.push_position(Some("a.B.c"), "F.java", 100 + line, 0);
    }
    pseudo(&mut pmap, PseudoPosition::Count, 2, 0);
    pmap.push_position(Some("a.B.c"), "F.java", 1, 0);
    pmap.push_position(Some("a.B.c"), "F.java", 2, 0);
    let maps = SymbolMaps::new(ClassMap::new(), pmap);

    let s = DexdumpSymbolicator::new(&maps, false);
    assert_eq!(s.decode_positions_at(5).unwrap(), vec!["switch {{F.java:1}, {F.java:2}}".to_string()]);
    assert_eq!(s.decode_positions_at(11).unwrap(), vec!["F.java:1".to_string()]);
}

#[test]
fn pattern_and_case_positions_decoded() {
    let mut pmap = PositionMap::new();
    pmap.push_position(Some("a.B.c"), "F.java", 7, 0);
    pseudo(&mut pmap, PseudoPosition::Pattern, 4, 1);
    pseudo(&mut pmap, PseudoPosition::Case, 9, 0);
    let maps = SymbolMaps::new(ClassMap::new(), pmap);

    let s = DexdumpSymbolicator::new(&maps, false);
    assert_eq!(s.decode_positions_at(1).unwrap(), vec!["pattern 4".to_string(), "F.java:7".to_string()]);
    assert_eq!(s.decode_positions_at(2).unwrap(), vec!["case(pattern 9)".to_string()]);
}

#[test]
fn malformed_switch_is_fatal() {
    // switch pointing at a real position instead of a count
    let mut pmap = PositionMap::new();
    pseudo(&mut pmap, PseudoPosition::Switch, 1, 0);
    pmap.push_position(Some("a.B.c"), "F.java", 1, 0);
    let maps = SymbolMaps::new(ClassMap::new(), pmap);
    let s = DexdumpSymbolicator::new(&maps, false);
    assert!(matches!(
        s.decode_positions_at(0),
        Err(SymbolicatorError::MalformedSwitch { index: 1, entries: 1 })
    ));

    // count entry with a parent yields a two entry stack
    let mut pmap = PositionMap::new();
    pseudo(&mut pmap, PseudoPosition::Switch, 1, 0);
    pseudo(&mut pmap, PseudoPosition::Count, 1, 3);
    pmap.push_position(Some("a.B.c"), "F.java", 1, 0);
    let maps = SymbolMaps::new(ClassMap::new(), pmap);
    let mut s = DexdumpSymbolicator::new(&maps, false);
    assert!(matches!(
        s.decode_positions_at(0),
        Err(SymbolicatorError::MalformedSwitch { index: 1, entries: 2 })
    ));
    // and the error reaches the caller of symbolicate
    assert!(s.symbolicate("        0x0000 line=1\n").is_err());
}

#[test]
fn switch_count_past_end_of_map_is_fatal() {
    let mut pmap = PositionMap::new();
    pseudo(&mut pmap, PseudoPosition::Switch, 1, 0);
    pseudo(&mut pmap, PseudoPosition::Count, u32::MAX, 0);
    pmap.push_position(Some("a.B.c"), "F.java", 1, 0);
    let maps = SymbolMaps::new(ClassMap::new(), pmap);
    let s = DexdumpSymbolicator::new(&maps, false);
    assert!(matches!(
        s.decode_positions_at(0),
        Err(SymbolicatorError::MalformedSwitch { index: 1, entries: 1 })
    ));

    // one branch too many
    let mut pmap = PositionMap::new();
    pseudo(&mut pmap, PseudoPosition::Switch, 1, 0);
    pseudo(&mut pmap, PseudoPosition::Count, 2, 0);
    pmap.push_position(Some("a.B.c"), "F.java", 1, 0);
    let maps = SymbolMaps::new(ClassMap::new(), pmap);
    let s = DexdumpSymbolicator::new(&maps, false);
    assert!(s.decode_positions_at(0).is_err());
}

#[test]
fn self_referencing_switch_hits_depth_limit() {
    let mut pmap = PositionMap::new();
    pseudo(&mut pmap, PseudoPosition::Switch, 1, 0);
    pseudo(&mut pmap, PseudoPosition::Count, 1, 0);
    pseudo(&mut pmap, PseudoPosition::Switch, 1, 0);
    let maps = SymbolMaps::new(ClassMap::new(), pmap);
    let s = DexdumpSymbolicator::new(&maps, false);
    assert!(matches!(s.decode_positions_at(0), Err(SymbolicatorError::RecursionLimit { .. })));
}

#[test]
fn dexdump_detection() {
    assert!(DexdumpSymbolicator::is_likely_dexdump("Processing 'foo.dex'...\n"));
    assert!(DexdumpSymbolicator::is_likely_dexdump("Class #3            -\n"));
    assert!(DexdumpSymbolicator::is_likely_dexdump("  Class #3\n"));
    assert!(!DexdumpSymbolicator::is_likely_dexdump("I/ActivityManager( 123): Start proc\n"));
    assert!(!DexdumpSymbolicator::is_likely_dexdump("Processing 'foo.jar'\n"));
}

#[test]
fn method_context_tracked_with_iodi() {
    let maps = iodi_maps();
    let mut s = DexdumpSymbolicator::new(&maps, false);
    let out = feed(
        &mut s,
        &["Class #0            -\n", "  Direct methods    -\n", "    #0              : (in La/b/C;)\n", "      name          : 'foo'\n"],
    );
    assert!(s.reading_methods());
    assert_eq!(out[2], Symbolicated::Line("    #0              : (in Lx/y/Z;)\n".to_string()));
    assert_eq!(out[3], Symbolicated::Line("      name          : 'bar'\n".to_string()));
    assert_eq!(s.current_class(), Some("a/b/C"));
    assert_eq!(s.current_method(), Some("foo"));
}

#[test]
fn iodi_lines_mapped_and_deduplicated() {
    let maps = iodi_maps();
    let mut s = DexdumpSymbolicator::new(&maps, false);
    let out = feed(
        &mut s,
        &[
            "Class #0            -\n",
            "  Virtual methods   -\n",
            "    #0              : (in La/b/C;)\n",
            "      name          : 'foo'\n",
            "      positions     : \n",
            "        0x0000 line=0\n",
            "        0x0002 line=2\n",
            "        0x0004 line=4\n",
        ],
    );
    assert_eq!(out[5], Symbolicated::Line("        0x0000 line=Foo.java:20\n".to_string()));
    assert_eq!(out[6], Symbolicated::Suppressed);
    assert_eq!(out[7], Symbolicated::Line("        0x0004 line=Foo.java:21\n".to_string()));

    let mut verbose = DexdumpSymbolicator::new(&maps, true);
    let out = feed(
        &mut verbose,
        &[
            "Class #0            -\n",
            "  Virtual methods   -\n",
            "    #0              : (in La/b/C;)\n",
            "      name          : 'foo'\n",
            "        0x0000 line=0\n",
            "        0x0002 line=2\n",
        ],
    );
    assert_eq!(out[4], Symbolicated::Line("        0x0000 line=0 (Foo.java:20)\n".to_string()));
    assert_eq!(out[5], Symbolicated::Line("        0x0002 line=2 (Foo.java:20)\n".to_string()));
}

#[test]
fn missing_debug_info_expanded_from_iodi() {
    let maps = iodi_maps();
    let mut s = DexdumpSymbolicator::new(&maps, false);
    let out = feed(
        &mut s,
        &[
            "Class #0            -\n",
            "  Direct methods    -\n",
            "    #1              : (in La/b/C;)\n",
            "      name          : 'baz'\n",
            "      positions     : \n",
            "      locals        : \n",
        ],
    );
    assert_eq!(out[3], Symbolicated::Line("      name          : 'baz'\n".to_string()));
    assert_eq!(out[4], Symbolicated::Line("      positions     : \n".to_string()));
    assert_eq!(
        out[5],
        Symbolicated::Block(vec![
            "        0x0000 line=Foo.java:10\n".to_string(),
            "        0x0006 line=Bar.java:3, Foo.java:10\n".to_string(),
            "      locals        : \n".to_string(),
        ])
    );
}

#[test]
fn missing_debug_info_without_iodi_entry_is_kept() {
    let maps = iodi_maps();
    let mut s = DexdumpSymbolicator::new(&maps, false);
    let out = feed(
        &mut s,
        &[
            "  Direct methods    -\n",
            "    #2              : (in La/b/C;)\n",
            "      name          : 'qux'\n",
            "      positions     : \n",
            "      locals        : \n",
        ],
    );
    assert_eq!(out[4], Symbolicated::Line("      locals        : \n".to_string()));
}

#[test]
fn field_sections_use_field_names() {
    let maps = iodi_maps();
    let mut s = DexdumpSymbolicator::new(&maps, false);
    let out = feed(
        &mut s,
        &[
            "Class #0            -\n",
            "  Instance fields   -\n",
            "    #0              : (in La/b/C;)\n",
            "      name          : 'a'\n",
            "      name          : 'foo'\n",
        ],
    );
    assert!(!s.reading_methods());
    assert_eq!(out[3], Symbolicated::Line("      name          : 'count'\n".to_string()));
    // method names are not looked up in a field section
    assert_eq!(out[4], Symbolicated::Line("      name          : 'foo'\n".to_string()));
}

#[test]
fn section_headers_reset_context() {
    let maps = iodi_maps();
    let mut s = DexdumpSymbolicator::new(&maps, false);
    feed(
        &mut s,
        &["  Direct methods    -\n", "    #0              : (in La/b/C;)\n", "      name          : 'foo'\n"],
    );
    assert_eq!(s.current_method(), Some("foo"));

    s.symbolicate("  Source file idx   : 12 (Z.java)\n").unwrap();
    assert!(!s.reading_methods());
    assert_eq!(s.current_class(), None);
    assert_eq!(s.current_method(), None);

    feed(
        &mut s,
        &["  Virtual methods   -\n", "    #0              : (in La/b/C;)\n", "      name          : 'foo'\n"],
    );
    s.symbolicate("Class #1            -\n").unwrap();
    assert_eq!(s.current_class(), None);

    feed(&mut s, &["  Direct methods    -\n", "    #0              : (in La/b/C;)\n"]);
    s.reset_state();
    assert!(!s.reading_methods());
    assert_eq!(s.current_class(), None);
    // with the context gone a line annotation only gets the plain rewrite
    assert_eq!(
        line(s.symbolicate("        0x0000 line=1\n").unwrap()),
        "        0x0000 line=Foo.java:10\n"
    );
}
