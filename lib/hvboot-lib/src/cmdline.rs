use core::str::SplitAsciiWhitespace;

pub struct CmdLine<'a> {
    iter: SplitAsciiWhitespace<'a>,
}

impl<'a> Iterator for CmdLine<'a> {
    type Item = (&'a str, Option<&'a str>);

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|kv| match kv.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (kv, None),
        })
    }
}

pub fn iter_cmdline(cmdline: &str) -> CmdLine<'_> {
    CmdLine {
        iter: cmdline.split_ascii_whitespace(),
    }
}

/// Options understood during bring-up. A present option without `=value`
/// reads as `Some("")`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Options<'a> {
    pub serial: Option<&'a str>,
    pub xhci: Option<&'a str>,
    pub xhci_power: Option<&'a str>,
}

impl<'a> Options<'a> {
    /// Later occurrences override earlier ones; unknown names are skipped.
    pub fn parse(cmdline: &'a str) -> Self {
        let mut opts = Self::default();
        for (k, v) in iter_cmdline(cmdline) {
            let v = Some(v.unwrap_or(""));
            match k {
                "serial" => opts.serial = v,
                "xhci" => opts.xhci = v,
                "xhci_power" => opts.xhci_power = v,
                _ => (),
            }
        }
        opts
    }
}

#[cfg(test)]
mod tests {
    use std::vec::Vec;

    use super::*;

    #[test]
    fn splits_key_values() {
        let kv: Vec<_> = iter_cmdline("  a=1 b   c=x=y ").collect();
        assert_eq!(kv, [("a", Some("1")), ("b", None), ("c", Some("x=y"))]);
    }

    #[test]
    fn empty_cmdline() {
        assert_eq!(Options::parse(""), Options::default());
        assert_eq!(iter_cmdline("   ").count(), 0);
    }

    #[test]
    fn flags_without_value() {
        let opts = Options::parse("quiet serial xhci");
        assert_eq!(opts.serial, Some(""));
        assert_eq!(opts.xhci, Some(""));
        assert_eq!(opts.xhci_power, None);
    }

    #[test]
    fn last_occurrence_wins() {
        let opts = Options::parse("xhci=A xhci_power=0 xhci=B xhci_power=1");
        assert_eq!(opts.xhci, Some("B"));
        assert_eq!(opts.xhci_power, Some("1"));
    }

    #[test]
    fn unknown_and_prefixed_names_ignored() {
        let opts = Options::parse("serials=1 xhci_pow=1 console=ttyS0");
        assert_eq!(opts, Options::default());
    }
}
