#[cfg(test)]
mod dexdump_cases;

#[cfg(test)]
mod tests {
    use crate::maps::class_map::parse_class_map;
    use crate::symbolicate::{LinesSymbolicator, Symbolicated};

    const RENAME_MAP: &str = "\
com.facebook.XyzClass -> X.A01:
    int count -> a
    java.lang.String name -> b
    void run(int,java.lang.String) -> c
    1:4:void <init>() -> <init>
com.facebook.Other -> X.A02:
";

    #[test]
    fn class_map_records() {
        let map = parse_class_map(RENAME_MAP);
        assert_eq!(map.len(), 2);
        let xyz = &map["X.A01"];
        assert_eq!(xyz.origin_class, "com.facebook.XyzClass");
        assert_eq!(xyz.field_mapping["a"], "count");
        assert_eq!(xyz.field_mapping["b"], "name");
        assert_eq!(xyz.method_mapping["c"], "run");
        assert_eq!(xyz.method_mapping["<init>"], "<init>");
        assert!(map["X.A02"].method_mapping.is_empty());
    }

    #[test]
    fn orphan_members_are_skipped() {
        let map = parse_class_map("    int count -> a\nfoo.Bar -> X.B:\n");
        assert_eq!(map.len(), 1);
        assert!(map["X.B"].field_mapping.is_empty());
    }

    #[test]
    fn lines_symbolicator() {
        let map = parse_class_map(RENAME_MAP);
        let keep = LinesSymbolicator::new(&map, false);
        assert_eq!(
            keep.symbolicate("X/A01.class\n"),
            Symbolicated::Line("com/facebook/XyzClass.class\n".to_string())
        );
        assert_eq!(
            keep.symbolicate("X/A02\n"),
            Symbolicated::Line("com/facebook/Other.class\n".to_string())
        );
        assert_eq!(keep.symbolicate("Y/Z.class\n"), Symbolicated::Line("Y/Z.class\n".to_string()));

        let skip = LinesSymbolicator::new(&map, true);
        assert!(skip.symbolicate("Y/Z.class\n").is_suppressed());
    }

    #[test]
    fn symbolicated_output() {
        let block = Symbolicated::Block(vec!["a\n".to_string(), "b\n".to_string()]);
        let mut out = vec![];
        block.write_to(&mut out).unwrap();
        assert_eq!(out, b"a\nb\n");
        assert_eq!(block.text().unwrap(), "a\nb\n");

        let mut out = vec![];
        Symbolicated::Suppressed.write_to(&mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(Symbolicated::Suppressed.text(), None);
    }
}
