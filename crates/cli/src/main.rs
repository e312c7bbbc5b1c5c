use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use fisio_core::config::page_size_from_env_value;
use fisio_core::constants::{
    DEFAULT_DATA_FILE, DEFAULT_PAGE_SIZE, DEFAULT_RECORD_PREFIX, MAX_PAGE_SIZE,
};
use fisio_core::demo::{self, DemoOptions};
use fisio_core::{
    fiscal_code, BodySide, ClinicalRecordService, ConsentKind, CoreConfig, CoreContext,
    DocumentCategory, ErrorKind, Gender, NewBodyMapping, NewDocument, NewPatient, NewRecord,
    NewTherapy, NewVitalSigns, ObservationService, PageRequest, PatientError, PatientRegistry,
    PatientSearch, PatientSortField, PatientUpdate, RecordOverrides, RecordSearch, RecordSection,
    RecordStatus, SessionOutcome, SessionService, SortOrder, TherapyParameters, TherapyService,
    YamlFileStore, TEMPLATES, THERAPY_TYPES,
};
use fisio_ids::parse_entity_id;

type Ctx = CoreContext<YamlFileStore>;

#[derive(Parser)]
#[command(name = "fisio")]
#[command(about = "Physiotherapy clinic records CLI", version)]
struct Cli {
    /// YAML data file (overrides FISIO_DATA_FILE)
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,
    /// Prefix of generated record numbers (overrides FISIO_RECORD_PREFIX)
    #[arg(long, global = true)]
    record_prefix: Option<String>,
    /// Default page size of list commands (overrides FISIO_PAGE_SIZE)
    #[arg(long, global = true)]
    page_size: Option<u32>,
    /// Largest page a list command may request (overrides FISIO_MAX_PAGE_SIZE)
    #[arg(long, global = true)]
    max_page_size: Option<u32>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the check letter of a fiscal code
    ValidateFiscalCode { code: String },
    /// List the clinical record templates
    Templates,
    /// List the therapy types
    TherapyTypes,
    /// Fill the data file with synthetic patients
    Seed {
        #[arg(long, default_value_t = 20)]
        patients: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    #[command(subcommand)]
    Patient(PatientCommand),
    #[command(subcommand)]
    Record(RecordCommand),
    #[command(subcommand)]
    Therapy(TherapyCommand),
    #[command(subcommand)]
    Session(SessionCommand),
    #[command(subcommand)]
    Observation(ObservationCommand),
}

#[derive(Args)]
struct PatientFields {
    #[arg(long)]
    fiscal_code: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    birth_date: Option<NaiveDate>,
    /// M, F or O
    #[arg(long)]
    gender: Option<Gender>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    postal_code: Option<String>,
    #[arg(long)]
    province: Option<String>,
    #[arg(long)]
    occupation: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct PageArgs {
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    limit: Option<u32>,
}

impl From<PageArgs> for PageRequest {
    fn from(args: PageArgs) -> Self {
        PageRequest {
            page: args.page,
            limit: args.limit,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum SortField {
    FirstName,
    #[default]
    LastName,
    FiscalCode,
    BirthDate,
    Gender,
    Email,
    Phone,
    City,
    CreatedAt,
    UpdatedAt,
}

impl From<SortField> for PatientSortField {
    fn from(field: SortField) -> Self {
        match field {
            SortField::FirstName => PatientSortField::FirstName,
            SortField::LastName => PatientSortField::LastName,
            SortField::FiscalCode => PatientSortField::FiscalCode,
            SortField::BirthDate => PatientSortField::BirthDate,
            SortField::Gender => PatientSortField::Gender,
            SortField::Email => PatientSortField::Email,
            SortField::Phone => PatientSortField::Phone,
            SortField::City => PatientSortField::City,
            SortField::CreatedAt => PatientSortField::CreatedAt,
            SortField::UpdatedAt => PatientSortField::UpdatedAt,
        }
    }
}

#[derive(Subcommand)]
enum PatientCommand {
    /// Register a patient
    Create {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[command(flatten)]
        fields: PatientFields,
    },
    Get {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
    },
    /// Change some fields; an empty value clears an optional field
    Update {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[command(flatten)]
        fields: PatientFields,
    },
    /// Soft-delete a patient without active records
    Delete {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
    },
    Search {
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        gender: Option<Gender>,
        #[arg(long)]
        min_age: Option<u32>,
        #[arg(long)]
        max_age: Option<u32>,
        #[arg(long)]
        active_record: Option<bool>,
        #[arg(long)]
        privacy_consent: Option<bool>,
        #[arg(long, value_enum, default_value_t)]
        sort_by: SortField,
        #[arg(long)]
        desc: bool,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Give or withdraw a consent
    Consent {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
        #[arg(long)]
        kind: ConsentKind,
        #[arg(long, action = clap::ArgAction::Set)]
        given: bool,
    },
    Consents {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
    },
    Stats {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum RecordCommand {
    /// Open a clinical record
    Create {
        #[arg(value_parser = parse_entity_id)]
        patient_id: Uuid,
        #[arg(long)]
        diagnosis: String,
        #[arg(long)]
        anamnesis: Option<String>,
        #[arg(long)]
        objective_examination: Option<String>,
        #[arg(long)]
        clinical_examination: Option<String>,
        #[arg(long)]
        treatment_plan: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        record_number: Option<String>,
    },
    /// Open a clinical record from a template
    FromTemplate {
        #[arg(value_parser = parse_entity_id)]
        patient_id: Uuid,
        template: String,
        #[arg(long)]
        diagnosis: Option<String>,
        #[arg(long)]
        anamnesis: Option<String>,
        #[arg(long)]
        treatment_plan: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        record_number: Option<String>,
    },
    Get {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
    },
    /// Replace one narrative section
    UpdateSection {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
        section: RecordSection,
        content: String,
    },
    /// Prescribe a therapy course
    AddTherapy {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
        #[arg(long = "type")]
        therapy_type: String,
        #[arg(long)]
        sessions: u32,
        #[arg(long)]
        frequency: Option<String>,
        #[arg(long)]
        district: Option<String>,
        #[arg(long)]
        start_date: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
        /// Therapy parameters as JSON
        #[arg(long)]
        parameters: Option<String>,
    },
    Therapies {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
    },
    Close {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
        #[arg(long)]
        notes: Option<String>,
    },
    Reopen {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
        #[arg(long)]
        reason: String,
    },
    Search {
        #[arg(long, value_parser = parse_entity_id)]
        patient: Option<Uuid>,
        #[arg(long)]
        status: Option<RecordStatus>,
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Oldest first
        #[arg(long)]
        asc: bool,
        #[command(flatten)]
        page: PageArgs,
    },
    Timeline {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
    },
    Stats {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum TherapyCommand {
    Get {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
    },
    Sessions {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
    },
    /// Schedule one session (RFC 3339 timestamp)
    Schedule {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
        #[arg(long)]
        at: DateTime<Utc>,
        #[arg(long)]
        duration: Option<u32>,
    },
    /// Schedule every missing session at a fixed spacing
    ScheduleCourse {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
        #[arg(long)]
        first: DateTime<Utc>,
        #[arg(long, default_value_t = 2)]
        interval_days: u32,
    },
    Suspend {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
    },
    Resume {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
    },
    Cancel {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
        #[arg(long)]
        reason: String,
    },
}

#[derive(Subcommand)]
enum SessionCommand {
    Get {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
    },
    /// Record the outcome of a session
    Complete {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
        #[arg(long)]
        vas_before: Option<i64>,
        #[arg(long)]
        vas_after: Option<i64>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        signature: Option<String>,
        /// Parameters actually used, as JSON
        #[arg(long)]
        parameters: Option<String>,
    },
    Cancel {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
        #[arg(long)]
        reason: String,
    },
    Missed {
        #[arg(value_parser = parse_entity_id)]
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum ObservationCommand {
    /// Log vital signs
    Vitals {
        #[arg(value_parser = parse_entity_id)]
        patient_id: Uuid,
        #[arg(long, value_parser = parse_entity_id)]
        record: Option<Uuid>,
        #[arg(long)]
        systolic: Option<u16>,
        #[arg(long)]
        diastolic: Option<u16>,
        #[arg(long)]
        heart_rate: Option<u16>,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long)]
        spo2: Option<u8>,
        #[arg(long)]
        weight: Option<f32>,
        #[arg(long)]
        height: Option<f32>,
        #[arg(long)]
        notes: Option<String>,
    },
    ListVitals {
        #[arg(value_parser = parse_entity_id)]
        record_id: Uuid,
    },
    /// Add a body-map pain entry
    BodyMap {
        #[arg(value_parser = parse_entity_id)]
        record_id: Uuid,
        #[arg(long)]
        region: String,
        #[arg(long)]
        side: Option<BodySide>,
        #[arg(long)]
        pain: Option<i64>,
        #[arg(long)]
        pain_type: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    ListBodyMaps {
        #[arg(value_parser = parse_entity_id)]
        record_id: Uuid,
    },
    /// Register document metadata
    Document {
        #[arg(value_parser = parse_entity_id)]
        patient_id: Uuid,
        #[arg(long, value_parser = parse_entity_id)]
        record: Option<Uuid>,
        #[arg(long)]
        file_name: String,
        #[arg(long)]
        category: DocumentCategory,
        #[arg(long)]
        description: Option<String>,
    },
    ListDocuments {
        #[arg(value_parser = parse_entity_id)]
        patient_id: Uuid,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(e) = init_tracing() {
        eprintln!("error: failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Logs go to stderr so stdout carries only JSON.
fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("fisio=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<PatientError>().map(PatientError::kind) {
        Some(ErrorKind::Validation) => 2,
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::Conflict) => 4,
        Some(ErrorKind::Storage) => 5,
        None => 1,
    }
}

/// Flags first, then the environment, then built-in defaults.
fn resolve_config(cli: &Cli) -> anyhow::Result<CoreConfig> {
    let data_file = cli
        .data_file
        .clone()
        .or_else(|| std::env::var_os("FISIO_DATA_FILE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE));
    let record_prefix = cli
        .record_prefix
        .clone()
        .or_else(|| std::env::var("FISIO_RECORD_PREFIX").ok())
        .unwrap_or_else(|| DEFAULT_RECORD_PREFIX.to_owned());
    let page_size = match cli.page_size {
        Some(size) => size,
        None => page_size_from_env_value(std::env::var("FISIO_PAGE_SIZE").ok(), DEFAULT_PAGE_SIZE)?,
    };
    let max_page_size = match cli.max_page_size {
        Some(size) => size,
        None => page_size_from_env_value(std::env::var("FISIO_MAX_PAGE_SIZE").ok(), MAX_PAGE_SIZE)?,
    };
    Ok(CoreConfig::new(data_file, &record_prefix, page_size, max_page_size)?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_parameters(raw: Option<String>) -> anyhow::Result<Option<TherapyParameters>> {
    raw.map(|json| serde_json::from_str(&json).context("therapy parameters are not valid JSON"))
        .transpose()
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::ValidateFiscalCode { code } => {
            return print_json(&serde_json::json!({
                "fiscalCode": fiscal_code::normalize(code),
                "valid": fiscal_code::validate(code),
            }));
        }
        Commands::Templates => return print_json(&TEMPLATES),
        Commands::TherapyTypes => return print_json(&THERAPY_TYPES),
        _ => {}
    }

    let cfg = resolve_config(&cli)?;
    let store = YamlFileStore::open(cfg.data_file())?;
    tracing::debug!(data_file = %cfg.data_file().display(), "store ready");
    let ctx = CoreContext::new(Arc::new(store), Arc::new(cfg));

    match cli.command {
        Commands::Seed { patients, seed } => {
            print_json(&demo::generate(&ctx, &DemoOptions { patients, seed })?)
        }
        Commands::Patient(command) => patient_command(&ctx, command),
        Commands::Record(command) => record_command(&ctx, command),
        Commands::Therapy(command) => therapy_command(&ctx, command),
        Commands::Session(command) => session_command(&ctx, command),
        Commands::Observation(command) => observation_command(&ctx, command),
        Commands::ValidateFiscalCode { .. } | Commands::Templates | Commands::TherapyTypes => Ok(()),
    }
}

fn patient_command(ctx: &Ctx, command: PatientCommand) -> anyhow::Result<()> {
    let registry = PatientRegistry::new(ctx.clone());
    match command {
        PatientCommand::Create {
            first_name,
            last_name,
            fields,
        } => print_json(&registry.create(NewPatient {
            first_name,
            last_name,
            fiscal_code: fields.fiscal_code,
            birth_date: fields.birth_date,
            gender: fields.gender,
            email: fields.email,
            phone: fields.phone,
            address: fields.address,
            city: fields.city,
            postal_code: fields.postal_code,
            province: fields.province,
            occupation: fields.occupation,
            notes: fields.notes,
        })?),
        PatientCommand::Get { id } => print_json(&registry.get(id)?),
        PatientCommand::Update {
            id,
            first_name,
            last_name,
            fields,
        } => print_json(&registry.update(
            id,
            PatientUpdate {
                first_name,
                last_name,
                fiscal_code: fields.fiscal_code,
                birth_date: fields.birth_date,
                gender: fields.gender,
                email: fields.email,
                phone: fields.phone,
                address: fields.address,
                city: fields.city,
                postal_code: fields.postal_code,
                province: fields.province,
                occupation: fields.occupation,
                notes: fields.notes,
            },
        )?),
        PatientCommand::Delete { id } => {
            registry.delete(id)?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
        PatientCommand::Search {
            query,
            gender,
            min_age,
            max_age,
            active_record,
            privacy_consent,
            sort_by,
            desc,
            page,
        } => print_json(&registry.search_advanced(PatientSearch {
            query,
            gender,
            min_age,
            max_age,
            has_active_record: active_record,
            privacy_consent,
            sort_by: sort_by.into(),
            order: if desc { SortOrder::Desc } else { SortOrder::Asc },
            page: page.into(),
        })?),
        PatientCommand::Consent { id, kind, given } => {
            print_json(&registry.set_consent(id, kind, given)?)
        }
        PatientCommand::Consents { id } => print_json(&registry.consents(id)?),
        PatientCommand::Stats { id } => print_json(&registry.statistics(id)?),
    }
}

fn record_command(ctx: &Ctx, command: RecordCommand) -> anyhow::Result<()> {
    let records = ClinicalRecordService::new(ctx.clone());
    match command {
        RecordCommand::Create {
            patient_id,
            diagnosis,
            anamnesis,
            objective_examination,
            clinical_examination,
            treatment_plan,
            notes,
            record_number,
        } => print_json(&records.create(
            patient_id,
            NewRecord {
                diagnosis,
                anamnesis,
                objective_examination,
                clinical_examination,
                treatment_plan,
                notes,
                record_number,
            },
        )?),
        RecordCommand::FromTemplate {
            patient_id,
            template,
            diagnosis,
            anamnesis,
            treatment_plan,
            notes,
            record_number,
        } => print_json(&records.create_from_template(
            patient_id,
            &template,
            RecordOverrides {
                diagnosis,
                anamnesis,
                treatment_plan,
                notes,
                record_number,
                ..Default::default()
            },
        )?),
        RecordCommand::Get { id } => print_json(&records.get(id)?),
        RecordCommand::UpdateSection {
            id,
            section,
            content,
        } => print_json(&records.update_section(id, section, &content)?),
        RecordCommand::AddTherapy {
            id,
            therapy_type,
            sessions,
            frequency,
            district,
            start_date,
            notes,
            parameters,
        } => print_json(&records.add_therapy(
            id,
            NewTherapy {
                therapy_type,
                prescribed_sessions: sessions,
                frequency,
                district,
                start_date,
                notes,
                parameters: parse_parameters(parameters)?,
            },
        )?),
        RecordCommand::Therapies { id } => print_json(&records.therapies(id)?),
        RecordCommand::Close { id, notes } => print_json(&records.close(id, notes.as_deref())?),
        RecordCommand::Reopen { id, reason } => print_json(&records.reopen(id, &reason)?),
        RecordCommand::Search {
            patient,
            status,
            query,
            from,
            to,
            asc,
            page,
        } => print_json(&records.search(RecordSearch {
            patient_id: patient,
            status,
            query,
            opened_from: from,
            opened_to: to,
            order: asc.then_some(SortOrder::Asc),
            page: page.into(),
        })?),
        RecordCommand::Timeline { id } => print_json(&records.timeline(id)?),
        RecordCommand::Stats { id } => print_json(&records.statistics(id)?),
    }
}

fn therapy_command(ctx: &Ctx, command: TherapyCommand) -> anyhow::Result<()> {
    let therapies = TherapyService::new(ctx.clone());
    match command {
        TherapyCommand::Get { id } => print_json(&therapies.get(id)?),
        TherapyCommand::Sessions { id } => print_json(&therapies.sessions(id)?),
        TherapyCommand::Schedule { id, at, duration } => {
            print_json(&therapies.schedule_session(id, at, duration)?)
        }
        TherapyCommand::ScheduleCourse {
            id,
            first,
            interval_days,
        } => print_json(&therapies.schedule_course(id, first, interval_days)?),
        TherapyCommand::Suspend { id } => print_json(&therapies.suspend(id)?),
        TherapyCommand::Resume { id } => print_json(&therapies.resume(id)?),
        TherapyCommand::Cancel { id, reason } => print_json(&therapies.cancel(id, &reason)?),
    }
}

fn session_command(ctx: &Ctx, command: SessionCommand) -> anyhow::Result<()> {
    let sessions = SessionService::new(ctx.clone());
    match command {
        SessionCommand::Get { id } => print_json(&sessions.get(id)?),
        SessionCommand::Complete {
            id,
            vas_before,
            vas_after,
            notes,
            signature,
            parameters,
        } => print_json(&sessions.complete(
            id,
            SessionOutcome {
                vas_before,
                vas_after,
                notes,
                parameters: parse_parameters(parameters)?,
                signature,
            },
        )?),
        SessionCommand::Cancel { id, reason } => print_json(&sessions.cancel(id, &reason)?),
        SessionCommand::Missed { id } => print_json(&sessions.mark_missed(id)?),
    }
}

fn observation_command(ctx: &Ctx, command: ObservationCommand) -> anyhow::Result<()> {
    let observations = ObservationService::new(ctx.clone());
    match command {
        ObservationCommand::Vitals {
            patient_id,
            record,
            systolic,
            diastolic,
            heart_rate,
            temperature,
            spo2,
            weight,
            height,
            notes,
        } => print_json(&observations.record_vital_signs(
            patient_id,
            record,
            NewVitalSigns {
                systolic_pressure: systolic,
                diastolic_pressure: diastolic,
                heart_rate,
                temperature,
                oxygen_saturation: spo2,
                weight_kg: weight,
                height_cm: height,
                notes,
                measured_at: None,
            },
        )?),
        ObservationCommand::ListVitals { record_id } => {
            print_json(&observations.vital_signs(record_id)?)
        }
        ObservationCommand::BodyMap {
            record_id,
            region,
            side,
            pain,
            pain_type,
            notes,
        } => print_json(&observations.add_body_mapping(
            record_id,
            NewBodyMapping {
                body_region: region,
                side,
                pain_intensity: pain,
                pain_type,
                notes,
                recorded_at: None,
            },
        )?),
        ObservationCommand::ListBodyMaps { record_id } => {
            print_json(&observations.body_mappings(record_id)?)
        }
        ObservationCommand::Document {
            patient_id,
            record,
            file_name,
            category,
            description,
        } => print_json(&observations.add_document(
            patient_id,
            record,
            NewDocument {
                file_name,
                category,
                description,
                uploaded_at: None,
            },
        )?),
        ObservationCommand::ListDocuments { patient_id } => {
            print_json(&observations.documents(patient_id)?)
        }
    }
}
