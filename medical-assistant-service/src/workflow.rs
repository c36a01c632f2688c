use care_flow::{Capability, Pipeline, PipelineBuilder, Role, WorkItem};
use std::sync::Arc;

use crate::models::PatientProfile;

pub const PIPELINE_ID: &str = "medical_consultation";
pub const DIAGNOSE_KEY: &str = "diagnose";
pub const TREAT_KEY: &str = "treat";

pub const DIAGNOSTICIAN: &str = "Diagnostician";
pub const TREATMENT_ADVISOR: &str = "Treatment Advisor";

/// The two fixed roles, built once per process and shared by every run
#[derive(Debug, Clone)]
pub struct MedicalRoles {
    pub diagnostician: Arc<Role>,
    pub treatment_advisor: Arc<Role>,
}

impl MedicalRoles {
    pub fn new() -> Self {
        let diagnostician = Role::new(
            DIAGNOSTICIAN,
            "Identify possible conditions from symptoms.",
            "This agent specializes in diagnosing medical conditions based on patient-reported symptoms and medical history.",
        )
        .with_capability(Capability::WebSearch);

        let treatment_advisor = Role::new(
            TREATMENT_ADVISOR,
            "Suggest effective treatments.",
            "This agent specializes in creating treatment plans tailored to individual patient needs.",
        )
        .with_capability(Capability::WebSearch);

        Self {
            diagnostician: Arc::new(diagnostician),
            treatment_advisor: Arc::new(treatment_advisor),
        }
    }
}

impl Default for MedicalRoles {
    fn default() -> Self {
        Self::new()
    }
}

/// Diagnose, then treat. Gender and age are not part of either prompt.
pub fn build_work_items(profile: &PatientProfile, roles: &MedicalRoles) -> [WorkItem; 2] {
    let diagnose = WorkItem::new(
        DIAGNOSE_KEY,
        roles.diagnostician.clone(),
        format!(
            "Analyze symptoms: {} and history: {}. Provide possible conditions.",
            profile.symptoms, profile.medical_history
        ),
        "A preliminary diagnosis with a list of possible conditions.",
    );

    // the diagnosis text reaches the advisor through the input record, not the description
    let treat = WorkItem::new(
        TREAT_KEY,
        roles.treatment_advisor.clone(),
        format!(
            "Based on diagnosis, recommend treatment considering history: {}.",
            profile.medical_history
        ),
        "A comprehensive treatment plan tailored to the patient's needs.",
    )
    .with_context_from(DIAGNOSE_KEY, "diagnosis_text")
    .with_input("medical_history", profile.medical_history.clone());

    [diagnose, treat]
}

pub fn build_medical_pipeline(
    profile: &PatientProfile,
    roles: &MedicalRoles,
) -> care_flow::Result<Pipeline> {
    let [diagnose, treat] = build_work_items(profile, roles);

    PipelineBuilder::new(PIPELINE_ID)
        .add_item(diagnose)
        .add_item(treat)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;

    fn profile(symptoms: &str, history: &str) -> PatientProfile {
        PatientProfile::new(Gender::Other, 40, symptoms, history).unwrap()
    }

    #[test]
    fn fever_and_diabetes_example() {
        let roles = MedicalRoles::new();
        let [diagnose, treat] = build_work_items(&profile("fever, cough", "diabetes"), &roles);

        assert_eq!(
            diagnose.description,
            "Analyze symptoms: fever, cough and history: diabetes. Provide possible conditions."
        );
        assert_eq!(
            treat.description,
            "Based on diagnosis, recommend treatment considering history: diabetes."
        );
        assert_eq!(
            diagnose.expected_output,
            "A preliminary diagnosis with a list of possible conditions."
        );
        assert_eq!(
            treat.expected_output,
            "A comprehensive treatment plan tailored to the patient's needs."
        );
    }

    #[test]
    fn roles_are_always_in_the_same_order() {
        let roles = MedicalRoles::new();
        let cases = [
            ("", ""),
            ("headache", ""),
            ("", "asthma"),
            ("şiddetli baş ağrısı", "hipertansiyon"),
        ];

        for (symptoms, history) in cases {
            let pipeline = build_medical_pipeline(&profile(symptoms, history), &roles).unwrap();
            let items = pipeline.items();

            assert_eq!(items.len(), 2);
            assert_eq!(items[0].role_name(), DIAGNOSTICIAN);
            assert_eq!(items[1].role_name(), TREATMENT_ADVISOR);
            assert_eq!(pipeline.start_key(), Some(DIAGNOSE_KEY));
            assert_eq!(pipeline.next_key(DIAGNOSE_KEY), Some(TREAT_KEY));
        }
    }

    #[test]
    fn symptoms_and_history_are_substituted_verbatim() {
        let symptoms = "sharp pain {left side}, 39.5°C";
        let history = "type 2 diabetes; penicillin allergy";
        let roles = MedicalRoles::new();
        let [diagnose, treat] = build_work_items(&profile(symptoms, history), &roles);

        assert!(diagnose.description.contains(symptoms));
        assert!(diagnose.description.contains(history));
        assert!(treat.description.contains(history));
        assert!(!treat.description.contains(symptoms));
    }

    #[test]
    fn treatment_consumes_diagnosis_and_history() {
        let [_, treat] = build_work_items(&profile("cough", "asthma"), &MedicalRoles::new());

        assert_eq!(treat.context_from.len(), 1);
        assert_eq!(treat.context_from[0].from, DIAGNOSE_KEY);
        assert_eq!(treat.context_from[0].field, "diagnosis_text");
        assert_eq!(
            treat.inputs,
            vec![("medical_history".to_string(), "asthma".to_string())]
        );
    }

    #[test]
    fn roles_search_and_never_delegate() {
        let roles = MedicalRoles::new();
        for role in [&roles.diagnostician, &roles.treatment_advisor] {
            assert!(role.can(Capability::WebSearch));
            assert!(!role.allow_delegation);
        }
    }
}
