//! Clinical record templates for the conditions the clinic treats most often.

use serde::Serialize;

use crate::{PatientError, PatientResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordTemplate {
    pub key: &'static str,
    pub name: &'static str,
    pub diagnosis: &'static str,
    pub objective_examination: &'static str,
    pub treatment_plan: &'static str,
}

pub const TEMPLATES: &[RecordTemplate] = &[
    RecordTemplate {
        key: "lombalgia",
        name: "Lombalgia",
        diagnosis: "Lombalgia aspecifica",
        objective_examination: "Limitazione della flessione lombare, contrattura paravertebrale, Lasègue negativo",
        treatment_plan: "Terapia manuale, esercizi di stabilizzazione del core, educazione posturale",
    },
    RecordTemplate {
        key: "cervicalgia",
        name: "Cervicalgia",
        diagnosis: "Cervicalgia meccanica",
        objective_examination: "Ridotta rotazione cervicale, trigger point sul trapezio superiore",
        treatment_plan: "Mobilizzazioni cervicali, massoterapia, esercizi di rinforzo dei flessori profondi",
    },
    RecordTemplate {
        key: "distorsione_caviglia",
        name: "Distorsione di caviglia",
        diagnosis: "Distorsione tibio-tarsica in inversione",
        objective_examination: "Edema perimalleolare laterale, dolore alla palpazione del legamento peroneo-astragalico anteriore",
        treatment_plan: "Linfodrenaggio, rieducazione propriocettiva, rinforzo dei peronieri",
    },
    RecordTemplate {
        key: "lesione_lca",
        name: "Riabilitazione post-ricostruzione LCA",
        diagnosis: "Esiti di ricostruzione del legamento crociato anteriore",
        objective_examination: "Deficit di estensione completa, ipotrofia del quadricipite, versamento articolare lieve",
        treatment_plan: "Recupero dell'articolarità, rinforzo progressivo del quadricipite, rieducazione propriocettiva e del gesto",
    },
    RecordTemplate {
        key: "spalla_congelata",
        name: "Spalla congelata",
        diagnosis: "Capsulite adesiva di spalla",
        objective_examination: "Limitazione globale del ROM attivo e passivo, in particolare in extrarotazione",
        treatment_plan: "Mobilizzazioni glenomerali, stretching capsulare, esercizi attivo-assistiti",
    },
    RecordTemplate {
        key: "epicondilite",
        name: "Epicondilite",
        diagnosis: "Epicondilite laterale (gomito del tennista)",
        objective_examination: "Dolore all'epicondilo laterale, test di Cozen positivo",
        treatment_plan: "Onde d'urto, esercizi eccentrici per gli estensori del polso, massaggio trasverso profondo",
    },
    RecordTemplate {
        key: "protesi_anca",
        name: "Protesi d'anca",
        diagnosis: "Esiti di artroprotesi totale d'anca",
        objective_examination: "Ipostenia degli abduttori, deambulazione con ausilio",
        treatment_plan: "Rinforzo muscolare, rieducazione al passo, training dei trasferimenti",
    },
    RecordTemplate {
        key: "protesi_ginocchio",
        name: "Protesi di ginocchio",
        diagnosis: "Esiti di artroprotesi totale di ginocchio",
        objective_examination: "Flessione limitata a 90°, deficit di estensione, edema post-operatorio",
        treatment_plan: "Recupero del ROM, rinforzo del quadricipite, rieducazione al cammino",
    },
    RecordTemplate {
        key: "tunnel_carpale",
        name: "Sindrome del tunnel carpale",
        diagnosis: "Sindrome del tunnel carpale",
        objective_examination: "Parestesie nel territorio del mediano, test di Phalen e Tinel positivi",
        treatment_plan: "Mobilizzazioni neurodinamiche, laserterapia, tutore notturno",
    },
    RecordTemplate {
        key: "tendinopatia_achillea",
        name: "Tendinopatia achillea",
        diagnosis: "Tendinopatia achillea inserzionale",
        objective_examination: "Dolore alla palpazione del tendine d'Achille, rigidità mattutina",
        treatment_plan: "Esercizi eccentrici, onde d'urto, correzione del carico",
    },
    RecordTemplate {
        key: "fascite_plantare",
        name: "Fascite plantare",
        diagnosis: "Fascite plantare",
        objective_examination: "Dolore all'inserzione calcaneare della fascia, peggiore ai primi passi del mattino",
        treatment_plan: "Stretching della fascia plantare e del tricipite surale, onde d'urto, plantare su misura",
    },
    RecordTemplate {
        key: "riabilitazione_post_ictus",
        name: "Riabilitazione post-ictus",
        diagnosis: "Emiparesi in esiti di ictus ischemico",
        objective_examination: "Deficit di forza e di controllo motorio dell'emilato, alterazione del cammino",
        treatment_plan: "Rieducazione neuromotoria, training del cammino, recupero dell'autonomia nelle ADL",
    },
];

/// Finds a template by key, case-insensitively.
pub fn template(key: &str) -> PatientResult<&'static RecordTemplate> {
    let key = key.trim();
    TEMPLATES
        .iter()
        .find(|t| t.key.eq_ignore_ascii_case(key))
        .ok_or_else(|| PatientError::TemplateNotFound(key.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn twelve_templates_with_unique_keys() {
        assert_eq!(TEMPLATES.len(), 12);
        let keys: HashSet<_> = TEMPLATES.iter().map(|t| t.key).collect();
        assert_eq!(keys.len(), TEMPLATES.len());
    }

    #[test]
    fn every_template_has_content() {
        for t in TEMPLATES {
            assert!(!t.diagnosis.trim().is_empty(), "{}", t.key);
            assert!(!t.objective_examination.trim().is_empty(), "{}", t.key);
            assert!(!t.treatment_plan.trim().is_empty(), "{}", t.key);
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(template("Lombalgia").unwrap().key, "lombalgia");
        assert!(matches!(
            template("influenza"),
            Err(PatientError::TemplateNotFound(_))
        ));
    }
}
