//! Synthetic clinic population for demos and manual testing.
//!
//! Every entity goes through the regular services, so generated data obeys the same
//! invariants as real data. Each step runs against a context whose clock is set to the
//! moment it happens: a record is opened, its sessions are completed on their scheduled
//! dates, and some records are discharged, all in the past relative to the context's
//! clock. The same seed always yields the same population.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::context::{CoreContext, FixedClock};
use crate::fiscal_code;
use crate::model::{
    BodySide, ConsentKind, DocumentCategory, Gender, NewBodyMapping, NewDocument, NewPatient,
    NewTherapy, NewVitalSigns, Patient, RecordOverrides, SessionOutcome,
};
use crate::repositories::{
    ClinicalRecordService, ObservationService, PatientRegistry, SessionService, TherapyService,
};
use crate::store::Store;
use crate::vas::progressive_vas;
use crate::PatientResult;

const MALE_NAMES: &[&str] = &[
    "Marco", "Luca", "Giuseppe", "Francesco", "Alessandro", "Andrea", "Matteo", "Lorenzo",
    "Davide", "Stefano",
];
const FEMALE_NAMES: &[&str] = &[
    "Giulia", "Francesca", "Sara", "Chiara", "Laura", "Valentina", "Martina", "Elena", "Anna",
    "Silvia",
];
const SURNAMES: &[&str] = &[
    "Rossi", "Russo", "Ferrari", "Esposito", "Bianchi", "Romano", "Colombo", "Ricci", "Marino",
    "Greco", "Bruno", "Gallo", "Conti", "De Luca", "Costa",
];
const OCCUPATIONS: &[&str] = &[
    "Impiegato", "Insegnante", "Infermiere", "Artigiano", "Commerciante", "Pensionato",
    "Studente", "Libero professionista",
];

struct City {
    name: &'static str,
    province: &'static str,
    postal_code: &'static str,
    /// Cadastral code used in the fiscal code.
    cadastral: &'static str,
}

const CITIES: &[City] = &[
    City { name: "Roma", province: "RM", postal_code: "00185", cadastral: "H501" },
    City { name: "Milano", province: "MI", postal_code: "20121", cadastral: "F205" },
    City { name: "Napoli", province: "NA", postal_code: "80133", cadastral: "F839" },
    City { name: "Torino", province: "TO", postal_code: "10121", cadastral: "L219" },
    City { name: "Bologna", province: "BO", postal_code: "40121", cadastral: "A944" },
    City { name: "Firenze", province: "FI", postal_code: "50122", cadastral: "D612" },
];

struct Case {
    template: &'static str,
    body_region: &'static str,
    therapies: &'static [&'static str],
}

const CASES: &[Case] = &[
    Case { template: "lombalgia", body_region: "Rachide lombare", therapies: &["TECAR", "MANUAL_THERAPY", "POSTURAL"] },
    Case { template: "cervicalgia", body_region: "Rachide cervicale", therapies: &["MASSAGE", "LASER", "POSTURAL"] },
    Case { template: "distorsione_caviglia", body_region: "Caviglia", therapies: &["MAGNETO", "PROPRIOCEPTIVE"] },
    Case { template: "lesione_lca", body_region: "Ginocchio", therapies: &["KINESIO", "FUNCTIONAL_REHAB"] },
    Case { template: "spalla_congelata", body_region: "Spalla", therapies: &["TECAR", "KINESIO"] },
    Case { template: "epicondilite", body_region: "Gomito", therapies: &["SHOCKWAVE", "LASER"] },
    Case { template: "protesi_anca", body_region: "Anca", therapies: &["FUNCTIONAL_REHAB", "LYMPH_DRAINAGE"] },
    Case { template: "protesi_ginocchio", body_region: "Ginocchio", therapies: &["FUNCTIONAL_REHAB", "MAGNETO"] },
    Case { template: "tunnel_carpale", body_region: "Polso", therapies: &["ULTRASOUND", "LASER"] },
    Case { template: "tendinopatia_achillea", body_region: "Tendine d'Achille", therapies: &["SHOCKWAVE", "KINESIO"] },
    Case { template: "fascite_plantare", body_region: "Pianta del piede", therapies: &["SHOCKWAVE", "TECAR"] },
    Case { template: "riabilitazione_post_ictus", body_region: "Emilato", therapies: &["FUNCTIONAL_REHAB", "KINESIO", "PROPRIOCEPTIVE"] },
];

const MONTH_LETTERS: &[u8; 12] = b"ABCDEHLMPRST";

/// Share of records generated as already discharged.
const CLOSED_SHARE: f64 = 0.3;
/// Chance that a past session of an open record was a no-show.
const MISSED_SHARE: f64 = 0.08;

#[derive(Clone, Debug)]
pub struct DemoOptions {
    pub patients: usize,
    pub seed: u64,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            patients: 20,
            seed: 42,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoSummary {
    pub patients: usize,
    pub records: usize,
    pub closed_records: usize,
    pub therapies: usize,
    pub sessions: usize,
    pub completed_sessions: usize,
    pub missed_sessions: usize,
}

/// Three-letter surname or name block of a fiscal code.
fn name_block(name: &str, is_first_name: bool) -> String {
    let letters: Vec<char> = name
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let (vowels, consonants): (Vec<char>, Vec<char>) =
        letters.into_iter().partition(|c| "AEIOU".contains(*c));

    if is_first_name && consonants.len() >= 4 {
        return [consonants[0], consonants[2], consonants[3]].iter().collect();
    }
    consonants
        .into_iter()
        .chain(vowels)
        .chain(std::iter::repeat('X'))
        .take(3)
        .collect()
}

/// Builds a fiscal code with a valid check letter. Omocodia is not modelled.
pub fn build_fiscal_code(
    last_name: &str,
    first_name: &str,
    birth_date: NaiveDate,
    gender: Gender,
    cadastral_code: &str,
) -> Option<String> {
    let month = *MONTH_LETTERS.get(birth_date.month0() as usize)?;
    let day = birth_date.day() + if gender == Gender::Female { 40 } else { 0 };
    let first15 = format!(
        "{}{}{:02}{}{:02}{}",
        name_block(last_name, false),
        name_block(first_name, true),
        birth_date.year().rem_euclid(100),
        char::from(month),
        day,
        cadastral_code.to_ascii_uppercase(),
    );
    let check = fiscal_code::check_character(&first15)?;
    Some(format!("{first15}{check}"))
}

fn at<S: Store>(ctx: &CoreContext<S>, when: DateTime<Utc>) -> CoreContext<S> {
    ctx.clone().with_clock(Arc::new(FixedClock(when)))
}

fn pick<'a, T>(rng: &mut StdRng, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

/// Populates the store behind `ctx` with `options.patients` patients, each with one
/// clinical record, its therapies and their session history.
pub fn generate<S: Store>(ctx: &CoreContext<S>, options: &DemoOptions) -> PatientResult<DemoSummary> {
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut used_codes = HashSet::new();
    let mut summary = DemoSummary::default();

    for _ in 0..options.patients {
        let patient = demo_patient(ctx, &mut rng, &mut used_codes)?;
        summary.patients += 1;
        demo_record(ctx, &mut rng, &patient, &mut summary)?;
    }

    tracing::info!(
        patients = summary.patients,
        records = summary.records,
        sessions = summary.sessions,
        seed = options.seed,
        "demo data generated"
    );
    Ok(summary)
}

fn demo_patient<S: Store>(
    ctx: &CoreContext<S>,
    rng: &mut StdRng,
    used_codes: &mut HashSet<String>,
) -> PatientResult<Patient> {
    let gender = if rng.gen_bool(0.5) { Gender::Female } else { Gender::Male };
    let first_name = *pick(rng, if gender == Gender::Female { FEMALE_NAMES } else { MALE_NAMES });
    let last_name = *pick(rng, SURNAMES);
    let city = pick(rng, CITIES);

    let age_days = rng.gen_range(18..=85) * 365 + rng.gen_range(0..365);
    let birth_date = ctx.clock.today() - Duration::days(age_days);

    // A code already handed out (in this run or stored earlier) is dropped; the patient
    // simply goes without one.
    let fiscal_code = match build_fiscal_code(last_name, first_name, birth_date, gender, city.cadastral) {
        Some(code) if used_codes.insert(code.clone()) => {
            let free = ctx.store.read(|data| data.fiscal_code_owner(&code).is_none())?;
            free.then_some(code)
        }
        _ => None,
    };

    let email_user: String = format!("{first_name}.{last_name}")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect::<String>()
        .to_lowercase();

    let registry = PatientRegistry::new(ctx.clone());
    let patient = registry.create(NewPatient {
        first_name: first_name.into(),
        last_name: last_name.into(),
        fiscal_code,
        birth_date: Some(birth_date),
        gender: Some(gender),
        email: Some(format!("{email_user}@example.it")),
        phone: Some(format!("3{:02} {:07}", rng.gen_range(20..=99), rng.gen_range(0..10_000_000))),
        address: Some(format!("Via Roma {}", rng.gen_range(1..=200))),
        city: Some(city.name.into()),
        postal_code: Some(city.postal_code.into()),
        province: Some(city.province.into()),
        occupation: Some((*pick(rng, OCCUPATIONS)).into()),
        notes: None,
    })?;

    registry.set_consent(patient.id, ConsentKind::Privacy, rng.gen_bool(0.9))?;
    if rng.gen_bool(0.3) {
        registry.set_consent(patient.id, ConsentKind::Marketing, true)?;
    }
    Ok(patient)
}

fn demo_record<S: Store>(
    ctx: &CoreContext<S>,
    rng: &mut StdRng,
    patient: &Patient,
    summary: &mut DemoSummary,
) -> PatientResult<()> {
    let now = ctx.now();
    let closed = rng.gen_bool(CLOSED_SHARE);
    // A discharged course must fit entirely in the past.
    let opened_at = if closed {
        now - Duration::days(rng.gen_range(40..=180))
    } else {
        now - Duration::days(rng.gen_range(0..=25))
    };
    let case = pick(rng, CASES);
    let initial_vas: u8 = rng.gen_range(5..=9);

    let record = ClinicalRecordService::new(at(ctx, opened_at)).create_from_template(
        patient.id,
        case.template,
        RecordOverrides::default(),
    )?;
    summary.records += 1;

    let observations = ObservationService::new(at(ctx, opened_at));
    observations.record_vital_signs(
        patient.id,
        Some(record.id),
        NewVitalSigns {
            systolic_pressure: Some(rng.gen_range(110..=140)),
            diastolic_pressure: Some(rng.gen_range(65..=90)),
            heart_rate: Some(rng.gen_range(58..=90)),
            temperature: Some(36.0 + f32::from(rng.gen_range(0u8..=8)) / 10.0),
            oxygen_saturation: Some(rng.gen_range(95..=99)),
            weight_kg: Some(f32::from(rng.gen_range(50u8..=95))),
            height_cm: Some(f32::from(rng.gen_range(155u8..=190))),
            notes: None,
            measured_at: None,
        },
    )?;
    observations.add_body_mapping(
        record.id,
        NewBodyMapping {
            body_region: case.body_region.into(),
            side: Some(*pick(rng, &[BodySide::Left, BodySide::Right, BodySide::Bilateral, BodySide::Central])),
            pain_intensity: Some(i64::from(initial_vas)),
            pain_type: Some((*pick(rng, &["Meccanico", "Infiammatorio", "Neuropatico"])).into()),
            notes: None,
            recorded_at: None,
        },
    )?;
    if rng.gen_bool(0.5) {
        observations.add_document(
            patient.id,
            Some(record.id),
            NewDocument {
                file_name: format!("impegnativa_{}.pdf", record.record_number),
                category: DocumentCategory::Referral,
                description: Some("Impegnativa del medico curante".into()),
                uploaded_at: None,
            },
        )?;
    }

    let count = rng.gen_range(1..=case.therapies.len().min(2));
    let mut discharged_at = opened_at;
    for (index, code) in case.therapies.choose_multiple(rng, count).enumerate() {
        let therapy = ClinicalRecordService::new(at(ctx, opened_at)).add_therapy(
            record.id,
            NewTherapy {
                therapy_type: (*code).into(),
                prescribed_sessions: rng.gen_range(5..=10),
                frequency: Some("2-3 volte a settimana".into()),
                district: Some(case.body_region.into()),
                start_date: Some(opened_at.date_naive()),
                notes: None,
                parameters: None,
            },
        )?;
        summary.therapies += 1;

        let first = opened_at + Duration::days(1 + index as i64);
        let sessions = TherapyService::new(at(ctx, opened_at)).schedule_course(
            therapy.id,
            first,
            rng.gen_range(2..=3),
        )?;
        summary.sessions += sessions.len();

        let total = sessions.len() as u32;
        let mut completed = 0u32;
        for session in sessions.iter().filter(|s| s.scheduled_at <= now) {
            let outcomes = SessionService::new(at(ctx, session.scheduled_at));
            if !closed && rng.gen_bool(MISSED_SHARE) {
                outcomes.mark_missed(session.id)?;
                summary.missed_sessions += 1;
                continue;
            }
            completed += 1;
            let reading = progressive_vas(rng, initial_vas, completed, total);
            outcomes.complete(
                session.id,
                SessionOutcome {
                    vas_before: Some(i64::from(reading.before)),
                    vas_after: Some(i64::from(reading.after)),
                    signature: Some("Dott. Ferri".into()),
                    ..Default::default()
                },
            )?;
            summary.completed_sessions += 1;
            discharged_at = discharged_at.max(session.scheduled_at + Duration::days(1));
        }
    }

    if closed {
        ClinicalRecordService::new(at(ctx, discharged_at))
            .close(record.id, Some("Obiettivi raggiunti, paziente dimesso"))?;
        summary.closed_records += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecordStatus, TherapyStatus};
    use crate::testing::context;

    #[test]
    fn fiscal_codes_carry_a_valid_check_letter() {
        let born = NaiveDate::from_ymd_opt(1985, 8, 1).unwrap();
        assert_eq!(
            build_fiscal_code("Rossi", "Mario", born, Gender::Male, "H501").as_deref(),
            Some("RSSMRA85M01H501Q")
        );

        let born = NaiveDate::from_ymd_opt(1990, 3, 15).unwrap();
        let code = build_fiscal_code("De Luca", "Giulia", born, Gender::Female, "F205").unwrap();
        assert_eq!(&code[..6], "DLCGLI");
        assert_eq!(&code[9..11], "55");
        assert!(fiscal_code::validate(&code));
    }

    #[test]
    fn long_first_names_skip_the_second_consonant() {
        assert_eq!(name_block("Francesco", true), "FNC");
        assert_eq!(name_block("Francesco", false), "FRN");
        assert_eq!(name_block("Al", false), "LAX");
    }

    #[test]
    fn generated_population_respects_invariants() {
        let ctx = context();
        let summary = generate(&ctx, &DemoOptions { patients: 12, seed: 3 }).unwrap();
        assert_eq!(summary.patients, 12);
        assert_eq!(summary.records, 12);

        let data = ctx.store().snapshot().unwrap();
        for patient in data.patients() {
            if let Some(code) = &patient.fiscal_code {
                assert!(fiscal_code::validate(code), "{code}");
            }
            assert!(data.records_of(patient.id).iter().filter(|r| r.is_active()).count() <= 1);
        }
        for record in data.records() {
            for therapy in data.therapies_of(record.id) {
                assert!(therapy.completed_sessions <= therapy.prescribed_sessions);
                if record.status == RecordStatus::Closed {
                    assert_eq!(therapy.status, TherapyStatus::Completed);
                }
            }
            for session in data.sessions_of_record(record.id) {
                assert!(session.performed_at.map_or(true, |at| at <= ctx.now()));
            }
        }
    }

    #[test]
    fn same_seed_same_population() {
        let options = DemoOptions { patients: 6, seed: 99 };
        let a = generate(&context(), &options).unwrap();
        let b = generate(&context(), &options).unwrap();
        assert_eq!(a, b);
    }
}
