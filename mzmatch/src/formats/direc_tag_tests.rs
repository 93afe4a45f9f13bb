#![allow(clippy::missing_panics_doc)]
use std::{collections::HashMap, io::Cursor};

use context_error::*;

use crate::{
    config::{ReaderSettings, SearchConfiguration, SequenceMatchingConfiguration},
    error::ParseErrorKind,
    model::{Advocate, SpectrumId, SpectrumKey},
    progress::CancellationToken,
    reader::IdentificationReader,
    test::test_format,
};

use super::DirecTagReader;

fn reader(data: &'static str, settings: ReaderSettings) -> DirecTagReader<Cursor<&'static str>> {
    DirecTagReader::from_reader(
        Cursor::new(data),
        "run1.tags",
        Some(data.len() as u64),
        settings,
    )
}

#[test]
fn tags() {
    let matches = test_format(
        || reader(DIREC_TAG, ReaderSettings::default()),
        &SearchConfiguration::default(),
        None,
        false,
    )
    .unwrap();
    // Spectrum 1 has no tags
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].key().file, "run1");
    assert_eq!(matches[0].key().spectrum, SpectrumId::Index(0));
    assert_eq!(matches[0].spectrum_number(), Some(1));
    assert_eq!(matches[1].key().spectrum, SpectrumId::Index(2));
    assert_eq!(matches[1].spectrum_number(), Some(3));

    let hits = matches[0].hits(&Advocate::DirecTag);
    assert_eq!(hits.len(), 3);
    // The tag that comes after spectrum 2 in the file still belongs to spectrum 0
    assert_eq!(hits[2].assumption.sequence(), "GGK");
    assert_eq!(
        hits.iter().map(|h| h.assumption.rank()).collect::<Vec<_>>(),
        [1, 2, 3]
    );
    let first = &hits[0].assumption;
    // The charge of the spectrum wins over the tag charge state
    assert_eq!(first.charge().value(), 2);
    assert!((first.e_value() - 1.2e-4).abs() < 1e-12);
    let tag = first.as_tag().unwrap();
    assert_eq!(tag.residues(), "PEM");
    assert!((tag.n_gap() - 300.1).abs() < 1e-9);
    assert!((tag.c_gap() - 512.3).abs() < 1e-9);
    assert_eq!(tag.modifications().len(), 1);
    assert_eq!(tag.modifications()[0].tag(), "15.994915@M");
    assert_eq!(tag.modifications()[0].site(), 3);
    assert!(tag.modifications()[0].is_variable());

    let deamidated = hits[1].assumption.as_tag().unwrap();
    assert_eq!(deamidated.residues(), "NAV");
    assert_eq!(deamidated.modifications()[0].tag(), "0.984016@N");
    assert_eq!(deamidated.modifications()[0].site(), 1);
}

#[test]
fn header() {
    let mut direc_tag = reader(DIREC_TAG, ReaderSettings::default());
    direc_tag
        .parse(
            &mut (),
            &SearchConfiguration::default(),
            Some(&SequenceMatchingConfiguration::default()),
            false,
        )
        .unwrap();
    assert_eq!(
        direc_tag.software_versions().get("DirecTag"),
        Some(&vec!["1.4.94".to_string()])
    );
    assert_eq!(direc_tag.input_file(), Some("D:\\data\\run1.mgf"));
    assert_eq!(direc_tag.tags_parameter("TagLength"), Some("3"));
    assert_eq!(
        direc_tag.tags_parameter("DynamicMods"),
        Some("M 0 15.994915 N 1 0.984016")
    );
    assert!(direc_tag.has_de_novo_tags());
    let tags = direc_tag.tags_by_key().unwrap();
    assert_eq!(
        tags.get("PEM"),
        Some(&vec![SpectrumKey::from_index("run1.mgf", 0)])
    );
    assert_eq!(tags.len(), 4);
}

#[test]
fn titles() {
    let mut titles = HashMap::new();
    titles.insert(
        "run1.mgf".to_string(),
        vec!["first".to_string(), "second".to_string(), "third".to_string()],
    );
    let matches = reader(DIREC_TAG, ReaderSettings::default().with_titles(titles))
        .parse(&mut (), &SearchConfiguration::default(), None, false)
        .unwrap();
    assert_eq!(
        matches[1].key().spectrum,
        SpectrumId::Title("third".to_string())
    );
}

#[test]
fn cancelled_before_index() {
    let token = CancellationToken::new();
    token.cancel();
    let mut progress = token.clone();
    let matches = reader(DIREC_TAG, ReaderSettings::default())
        .parse(&mut progress, &SearchConfiguration::default(), None, false)
        .unwrap();
    assert!(matches.is_empty());
}

#[test]
fn unknown_modification_index() {
    let error = reader(DIREC_TAG_UNKNOWN_MODIFICATION, ReaderSettings::default())
        .parse(&mut (), &SearchConfiguration::default(), None, false)
        .unwrap_err();
    assert!(matches!(error.get_kind(), ParseErrorKind::MalformedRecord));
}

#[test]
fn missing_tag_column() {
    let error = reader(DIREC_TAG_MISSING_COLUMN, ReaderSettings::default())
        .parse(&mut (), &SearchConfiguration::default(), None, false)
        .unwrap_err();
    assert!(matches!(
        error.get_kind(),
        ParseErrorKind::MissingMandatoryField
    ));
}

const DIREC_TAG: &str = "H\tTagsGenerator\tDirecTag
H\tTagsGeneratorVersion\t1.4.94
H\tDirecTag 1.4.94 (c) 2008 Vanderbilt University
H\tInputFile\tD:\\data\\run1.mgf
H\tTagsParameters
H\tClassSizeMultiplier: 2, DynamicMods: M 0 15.994915 N 1 0.984016, TagLength: 3
H\tMaxPeakCount: 100

H(S)\tID\tCharge\tSource
H(T)\tTag\tnTerminusMass\tcTerminusMass\tTagChargeState\tTotal
S\tindex=0\t2\trun1.mgf
T\tPE0\t300.1\t512.3\t1\t1.2e-4
T\t1AV\t120.0\t700.5\t1\t3.5e-3
S\tindex=1\t3\trun1.mgf
S\tindex=2\t2\trun1.mgf
T\tLLK\t400.2\t150.8\t2\t2.0e-2
S\tindex=0\t2\trun1.mgf
T\tGGK\t612.0\t0.0\t1\t4.0e-2
";

const DIREC_TAG_UNKNOWN_MODIFICATION: &str = "H\tTagsGenerator\tDirecTag
H\tTagsParameters
H\tDynamicMods: M 0 15.994915

H(S)\tID\tCharge
H(T)\tTag\tnTerminusMass\tcTerminusMass\tTagChargeState\tTotal
S\tindex=0\t2
T\tPE7\t300.1\t512.3\t1\t1.2e-4
";

const DIREC_TAG_MISSING_COLUMN: &str = "H\tTagsGenerator\tDirecTag
H\tTagsParameters
H\tTagLength: 3

H(S)\tID\tCharge
H(T)\tTag\tnTerminusMass\tTagChargeState\tTotal
S\tindex=0\t2
";
