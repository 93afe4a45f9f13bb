#![allow(clippy::missing_panics_doc)]
use std::io::BufReader;

use context_error::*;

use crate::{
    config::{ReaderSettings, SearchConfiguration},
    error::ParseErrorKind,
    model::{Advocate, SpectrumId},
    reader::IdentificationReader,
    resolution::{FixedModificationRule, SpecificityRule},
    test::test_format,
};

use super::AndromedaReader;

fn reader(data: &'static str) -> AndromedaReader<BufReader<&'static [u8]>> {
    AndromedaReader::from_reader(
        BufReader::new(data.as_bytes()),
        "run1.res",
        Some(data.len() as u64),
        ReaderSettings::default(),
    )
}

#[test]
fn unmodified() {
    let matches = test_format(
        || reader(ANDROMEDA_UNMODIFIED),
        &SearchConfiguration::default(),
        None,
        false,
    )
    .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].key().file, "run1");
    assert_eq!(
        matches[0].key().spectrum,
        SpectrumId::Title("scan=1".to_string())
    );
    let assumption = &matches[0].hits(&Advocate::Andromeda)[0].assumption;
    assert!((assumption.e_value() - 0.01).abs() < 1e-9);
    assert_eq!(assumption.raw_score(), Some(20.0));
    assert!(assumption.as_peptide().unwrap().modifications().is_empty());
}

#[test]
fn modified() {
    let search = SearchConfiguration::default().with_fixed_modification(
        FixedModificationRule::new(42.010565, "")
            .with_specificity(SpecificityRule::ProteinNTerm),
    );
    let matches = test_format(|| reader(ANDROMEDA_MODIFIED), &search, None, false).unwrap();
    assert_eq!(matches.len(), 2);

    let hits = matches[0].hits(&Advocate::Andromeda);
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[1].assumption.rank(), 2);
    let modifications = hits[0].assumption.as_peptide().unwrap().modifications();
    assert_eq!(modifications.len(), 2);
    // N-terminal acetylation, fixed through the rule and moved to the first residue
    assert_eq!(modifications[0].tag(), "42.010565@M");
    assert_eq!(modifications[0].site(), 1);
    assert!(modifications[0].is_fixed());
    assert_eq!(modifications[1].tag(), "15.994915@M");
    assert_eq!(modifications[1].site(), 1);
    assert!(modifications[1].is_variable());

    // Explicit rank column and C-terminal modification
    let second = &matches[1].hits(&Advocate::Andromeda)[0].assumption;
    assert_eq!(second.rank(), 3);
    let modification = &second.as_peptide().unwrap().modifications()[0];
    assert_eq!(modification.site(), 4);
    assert_eq!(modification.tag(), "0.984016@K");
}

#[test]
fn signed_charges() {
    let matches = test_format(
        || reader(ANDROMEDA_SIGNED_CHARGES),
        &SearchConfiguration::default(),
        None,
        false,
    )
    .unwrap();
    let hits = matches[0].hits(&Advocate::Andromeda);
    assert_eq!(
        hits.iter()
            .map(|h| h.assumption.charge().value())
            .collect::<Vec<_>>(),
        [3, -2]
    );
    let error = reader(">scan=1\nPEPTIDE\ttwo\t20\tA,A,A,A,A,A,A,A,A\n")
        .parse(&mut (), &SearchConfiguration::default(), None, false)
        .unwrap_err();
    assert!(matches!(error.get_kind(), ParseErrorKind::MalformedRecord));
}

#[test]
fn hit_without_spectrum() {
    let error = reader("PEPTIDE\t2\t20\tA,A,A,A,A,A,A,A,A\n")
        .parse(&mut (), &SearchConfiguration::default(), None, false)
        .unwrap_err();
    assert!(matches!(error.get_kind(), ParseErrorKind::MalformedRecord));
}

#[test]
fn modification_outside_sequence() {
    let error = reader(">scan=1\nPEP\t2\t20\tA,A,A,A,A,15.99\n")
        .parse(&mut (), &SearchConfiguration::default(), None, false)
        .unwrap_err();
    assert!(matches!(error.get_kind(), ParseErrorKind::MalformedRecord));
}

const ANDROMEDA_SIGNED_CHARGES: &str = ">scan=1
PEPTIDE\t3+\t20\tA,A,A,A,A,A,A,A,A
PEPTIDA\t2-\t15\tA,A,A,A,A,A,A,A,A
";

const ANDROMEDA_UNMODIFIED: &str = ">scan=1
A\t2\t20\tA,A,A
";

const ANDROMEDA_MODIFIED: &str = ">scan=1
MPEPTK\t2\t85.3\t42.010565,15.994915,A,A,A,A,A,A
MPEPTR\t2\t30.1\tA,A,A,A,A,A,A,A

>scan=2
PEPK\t3\t45.0\tA,A,A,A,A,0.984016\t3
";
