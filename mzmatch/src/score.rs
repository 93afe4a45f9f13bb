//! Normalise engine specific scores into one comparable e-value (lower is better)

use std::collections::HashMap;

use context_error::{BoxedError, CreateError, Context};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ParseError, ParseErrorKind},
    model::Advocate,
};

/// The conversion from a raw score to an e-value
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Conversion {
    /// The value is already an e-value like score
    Identity,
    /// `2^-x`
    PowerTwoNegative,
    /// `10^-x`
    PowerTenNegative,
    /// `10^x`
    PowerTen,
    /// `e^-x`
    ExpNegative,
    /// `1-x`
    OneMinus,
}

impl Conversion {
    /// Apply this conversion
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Identity => x,
            Self::PowerTwoNegative => 2.0_f64.powf(-x),
            Self::PowerTenNegative => 10.0_f64.powf(-x),
            Self::PowerTen => 10.0_f64.powf(x),
            Self::ExpNegative => (-x).exp(),
            Self::OneMinus => 1.0 - x,
        }
    }
}

/// The advocate a score field belongs to
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ScoreAdvocate {
    /// A field that is specific to one engine
    Known(Advocate),
    /// A generic field (like a q-value) where the engine has to be determined from the file
    Generic,
}

/// One row in the score normalisation table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoreRule {
    /// The field identifier, a PSI-MS accession
    pub accession: &'static str,
    /// The advocate to assign the hit to
    pub advocate: ScoreAdvocate,
    /// How to get to an e-value
    pub conversion: Conversion,
}

const fn rule(accession: &'static str, advocate: Advocate, conversion: Conversion) -> ScoreRule {
    ScoreRule {
        accession,
        advocate: ScoreAdvocate::Known(advocate),
        conversion,
    }
}

const fn generic(accession: &'static str, conversion: Conversion) -> ScoreRule {
    ScoreRule {
        accession,
        advocate: ScoreAdvocate::Generic,
        conversion,
    }
}

use Conversion::{
    ExpNegative, Identity, OneMinus, PowerTen, PowerTenNegative, PowerTwoNegative,
};

/// The score normalisation table, in order of preference. The first rule whose accession is
/// present on a record is used.
pub static SCORE_TABLE: &[ScoreRule] = &[
    rule("MS:1001568", Advocate::Scaffold, Identity), // Scaffold:Peptide Probability
    rule("MS:1002466", Advocate::PeptideShaker, PowerTenNegative), // PeptideShaker PSM score
    rule("MS:1002467", Advocate::PeptideShaker, PowerTenNegative), // PeptideShaker PSM confidence
    rule("MS:1001330", Advocate::XTandem, Identity), // X!Tandem:expect
    rule("MS:1001331", Advocate::XTandem, PowerTenNegative), // X!Tandem:hyperscore
    rule("MS:1001328", Advocate::Omssa, Identity),   // OMSSA:evalue
    rule("MS:1002052", Advocate::MsGf, Identity),    // MS-GF:SpecEValue
    rule("MS:1002319", Advocate::MsAmanda, PowerTen), // Amanda:AmandaScore
    rule("MS:1002338", Advocate::Andromeda, Identity), // Andromeda:PEP
    rule("MS:1002262", Advocate::Byonic, PowerTenNegative), // Byonic:Score
    rule("MS:1002311", Advocate::Byonic, PowerTenNegative), // Byonic:Peptide AbsLogProb
    rule("MS:1002265", Advocate::Byonic, Identity),  // Byonic:PEP
    rule("MS:1002309", Advocate::Byonic, PowerTenNegative), // Byonic:Peptide AbsLogProb2D
    rule("MS:1002266", Advocate::Byonic, PowerTen),  // Byonic:Peptide LogProb
    rule("MS:1002255", Advocate::Comet, Identity),   // Comet:expectation value
    rule("MS:1002252", Advocate::Comet, PowerTenNegative), // Comet:xcorr
    rule("MS:1002053", Advocate::MsGf, Identity),    // MS-GF:EValue
    rule("MS:1002056", Advocate::MsGf, Identity),    // MS-GF:PEP
    rule("MS:1002055", Advocate::MsGf, Identity),    // MS-GF:PepQValue
    rule("MS:1002054", Advocate::MsGf, Identity),    // MS-GF:QValue
    rule("MS:1002049", Advocate::MsGf, Identity),    // MS-GF:RawScore
    rule("MS:1001501", Advocate::MsFit, Identity),   // MSFit:Mowse score
    rule("MS:1001172", Advocate::Mascot, Identity),  // Mascot:expectation value
    rule("MS:1001171", Advocate::Mascot, PowerTenNegative), // Mascot:score
    rule("MS:1001589", Advocate::MyriMatch, ExpNegative), // MyriMatch:MVH
    rule("MS:1001590", Advocate::MyriMatch, ExpNegative), // MyriMatch:mzFidelity
    rule("MS:1001329", Advocate::Omssa, Identity),   // OMSSA:pvalue
    rule("MS:1002448", Advocate::Peaks, Identity),   // PEAKS:inChorusPeptideScore
    rule("MS:1001950", Advocate::Peaks, PowerTenNegative), // PEAKS:peptideScore
    rule("MS:1001396", Advocate::Phenyx, Identity),  // Phenyx:PepPvalue
    rule("MS:1001395", Advocate::Phenyx, PowerTwoNegative), // Phenyx:Pepzscore
    rule("MS:1001499", Advocate::ProFound, PowerTenNegative),
    rule("MS:1001498", Advocate::ProFound, PowerTwoNegative), // ProFound:Z value
    rule("MS:1001570", Advocate::ProteinLynx, PowerTen), // ProteinLynx:Log Likelihood
    rule("MS:1001569", Advocate::ProteinLynx, PowerTenNegative), // ProteinLynx:Ladder Score
    rule("MS:1002045", Advocate::ProteinProspector, Identity), // ProteinProspector:expectation value
    rule("MS:1002044", Advocate::ProteinProspector, PowerTenNegative), // ProteinProspector:score
    rule("MS:1001503", Advocate::ProteinScape, Identity),
    rule("MS:1001504", Advocate::ProteinScape, PowerTenNegative),
    rule("MS:1001154", Advocate::Sequest, Identity), // SEQUEST:probability
    rule("MS:1001155", Advocate::Sequest, PowerTenNegative), // SEQUEST:xcorr
    rule("MS:1001215", Advocate::Sequest, Identity), // SEQUEST:PeptideIdnumber
    rule("MS:1002248", Advocate::Sequest, PowerTenNegative), // SEQUEST:spscore
    rule("MS:1001887", Advocate::Sqid, PowerTenNegative), // SQID:score
    rule("MS:1001502", Advocate::Sonar, PowerTenNegative), // Sonar:Score
    rule("MS:1001417", Advocate::SpectraSt, PowerTenNegative), // SpectraST:dot
    rule("MS:1001572", Advocate::SpectrumMill, PowerTenNegative), // SpectrumMill:Score
    rule("MS:1001952", Advocate::ZCore, Identity),   // ZCore:probScore
    rule("MS:1001491", Advocate::Percolator, Identity), // percolator:Q value
    rule("MS:1001493", Advocate::Percolator, Identity), // percolator:PEP
    rule("MS:1001492", Advocate::Percolator, PowerTenNegative), // percolator:score
    generic("MS:1002353", Identity), // PSM-level e-value
    generic("MS:1002354", Identity), // PSM-level q-value
    generic("MS:1002357", OneMinus), // PSM-level probability
    generic("MS:1002352", OneMinus),
];

/// The outcome of normalising the scores of one record
#[derive(Clone, Debug, PartialEq)]
pub struct NormalisedScore {
    /// The advocate the hit is attributed to
    pub advocate: Advocate,
    /// The accession that was used
    pub accession: &'static str,
    /// The e-value, lower is better
    pub e_value: f64,
    /// The raw value from the file, only stored when it differs from the e-value
    pub raw_score: Option<f64>,
}

/// Find the preferred score field on a record and convert it into an e-value. Generic fields
/// are attributed to the advocate given by `generic_advocate`.
/// # Errors
/// If none of the fields in the record are in the table, the error names all fields seen.
pub fn normalise_score(
    fields: &HashMap<String, f64>,
    generic_advocate: impl FnOnce() -> Advocate,
) -> Result<NormalisedScore, ParseError> {
    for rule in SCORE_TABLE {
        if let Some(&value) = fields.get(rule.accession) {
            let advocate = match &rule.advocate {
                ScoreAdvocate::Known(advocate) => advocate.clone(),
                ScoreAdvocate::Generic => generic_advocate(),
            };
            return Ok(NormalisedScore {
                advocate,
                accession: rule.accession,
                e_value: rule.conversion.apply(value),
                raw_score: (rule.conversion != Conversion::Identity).then_some(value),
            });
        }
    }
    Err(BoxedError::new(
        ParseErrorKind::UnrecognizedScoreField,
        "Unrecognised score",
        if fields.is_empty() {
            "This record does not have any score fields".to_string()
        } else {
            format!(
                "None of the score fields on this record are known, found: {}",
                fields.keys().sorted().join(", ")
            )
        },
        Context::none(),
    ))
}

/// Look up the rule for a single accession
pub fn score_rule(accession: &str) -> Option<&'static ScoreRule> {
    SCORE_TABLE.iter().find(|r| r.accession == accession)
}
