#![allow(clippy::missing_panics_doc)]
use std::io::BufReader;

use context_error::*;

use crate::{
    config::{ReaderSettings, SearchConfiguration, SequenceMatchingConfiguration},
    error::ParseErrorKind,
    model::{Advocate, SpectrumId, SpectrumKey},
    reader::IdentificationReader,
    test::test_format,
};

use super::PepNovoReader;

fn reader(data: &'static str) -> PepNovoReader<BufReader<&'static [u8]>> {
    PepNovoReader::from_reader(
        BufReader::new(data.as_bytes()),
        "run1.mgf.out",
        Some(data.len() as u64),
        ReaderSettings::default(),
    )
}

#[test]
fn tags() {
    let matches = test_format(
        || reader(PEPNOVO),
        &SearchConfiguration::default(),
        None,
        false,
    )
    .unwrap();
    // The spectrum without marker is skipped
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].key().file, "run1");
    assert_eq!(
        matches[0].key().spectrum,
        SpectrumId::Title("File1 Spectrum3 scans: 3".to_string())
    );

    let hits = matches[0].hits(&Advocate::PepNovo);
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].assumption.rank(), 1);
    assert_eq!(hits[1].assumption.rank(), 2);
    assert!((hits[0].assumption.e_value() - 55.2).abs() < 1e-9);
    assert_eq!(hits[0].assumption.raw_score(), Some(1.52));
    assert_eq!(hits[0].assumption.charge().value(), 2);

    let tag = hits[0].assumption.as_tag().unwrap();
    assert_eq!(tag.residues(), "PEPMTIDE");
    assert!(tag.n_gap().abs() < 1e-9);
    assert!(tag.c_gap().abs() < 1e-3);
    let modifications = tag.modifications();
    assert_eq!(modifications.len(), 2);
    assert_eq!(modifications[0].tag(), "42@P");
    assert_eq!(modifications[0].site(), 1);
    assert_eq!(modifications[1].tag(), "16@M");
    assert_eq!(modifications[1].site(), 4);
    assert!(modifications.iter().all(|m| m.is_variable()));

    let gapped = hits[1].assumption.as_tag().unwrap();
    assert!((gapped.n_gap() - 227.1).abs() < 1e-9);
    assert!((gapped.c_gap() - (350.2 - 19.017841150522)).abs() < 1e-9);
    assert_eq!(gapped.modifications()[0].tag(), "-18@K");
    assert_eq!(gapped.modifications()[0].site(), 3);

    // A spectrum with a problem marker is kept
    assert_eq!(
        matches[1].key().spectrum,
        SpectrumId::Title("File1.scan9".to_string())
    );
}

#[test]
fn tag_map() {
    let mut pepnovo = reader(PEPNOVO);
    assert!(pepnovo.has_de_novo_tags());
    assert_eq!(
        pepnovo.software_versions().get("PepNovo+"),
        Some(&vec!["3.1 (beta)".to_string()])
    );
    pepnovo
        .parse(
            &mut (),
            &SearchConfiguration::default(),
            Some(&SequenceMatchingConfiguration::default()),
            false,
        )
        .unwrap();
    let tags = pepnovo.tags_by_key().unwrap();
    let first = SpectrumKey::from_title("run1.mgf", "File1 Spectrum3 scans: 3");
    assert_eq!(tags.get("PEP"), Some(&vec![first.clone()]));
    assert_eq!(tags.get("TID"), Some(&vec![first]));
    assert!(tags.get("MTI").is_some());
    pepnovo.clear_tags_map();
    assert!(pepnovo.tags_by_key().is_none());
}

#[test]
fn no_tag_map_without_configuration() {
    let mut pepnovo = reader(PEPNOVO);
    pepnovo
        .parse(&mut (), &SearchConfiguration::default(), None, false)
        .unwrap();
    assert!(pepnovo.tags_by_key().is_none());
}

#[test]
fn wrong_header() {
    let error = reader(">> 0 1 File1.scan1 (SQS 0.5)\n#Index\tScore\tSequence\n")
        .parse(&mut (), &SearchConfiguration::default(), None, false)
        .unwrap_err();
    assert!(matches!(error.get_kind(), ParseErrorKind::MalformedRecord));
}

#[test]
fn c_gap_too_small() {
    let error = reader(
        ">> 0 1 File1.scan1 (SQS 0.5)\n#Index\tRnkScr\tPnvScr\tN-Gap\tC-Gap\t[M+H]\tCharge\tSequence\n0\t1.0\t20.0\t0.0\t10.0\t500.2\t2\tPEPK\n",
    )
    .parse(&mut (), &SearchConfiguration::default(), None, false)
    .unwrap_err();
    assert!(matches!(error.get_kind(), ParseErrorKind::MalformedRecord));
}

const PEPNOVO: &str = ">> 0 3 File1%20Spectrum3%20scans%3A%203 (SQS 0.92)
#Index\tRnkScr\tPnvScr\tN-Gap\tC-Gap\t[M+H]\tCharge\tSequence
0\t1.52\t55.2\t0.000\t19.018\t1002.51\t2\t^+42PEPM+16TIDE
1\t0.87\t41.7\t227.100\t350.200\t1002.51\t2\tGTK-18

>> 0 5 File1.scan5
# No solutions found.

>> 0 9 File1.scan9 #Problem reading peaks
# too few peaks
#Index\tRnkScr\tPnvScr\tN-Gap\tC-Gap\t[M+H]\tCharge\tSequence
0\t0.12\t12.5\t0.000\t0.000\t650.30\t1\tAPLK
";
