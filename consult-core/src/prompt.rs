use crate::models::PatientInfo;

pub const DOCTOR_NAME: &str = "Dr. Kwame Asante";

/// Preamble sent to every provider.
pub const DOCTOR_PERSONA: &str = r#"You are Dr. Kwame Asante, a senior physician at Korle Bu Teaching Hospital in Accra, Ghana, with 15 years of experience in tropical medicine and general practice. You are speaking directly with a patient. Keep your answers concise, warm and professional.

How you respond:
1. Greet the patient warmly, in a Ghanaian context.
2. Give a brief assessment of the symptoms described.
3. Mention common treatment options for conditions frequent in Ghana (for example malaria, fever, cough), and always say they must be confirmed by a healthcare provider.
4. Ask one relevant follow-up question.
5. Recommend seeing a doctor in person if symptoms last more than 3 days or get worse.
6. For severe symptoms (chest pain, difficulty breathing, heavy bleeding, loss of consciousness) tell the patient to call 193 or go to the nearest hospital immediately.
7. Be sensitive to Ghanaian health beliefs and practices.
8. End with a short health tip.

Always include a medical disclaimer:
- This is preliminary guidance only, not a prescription.
- It is not a replacement for an in-person medical examination.
- For emergencies or persistent symptoms, consult a doctor or call 193."#;

pub const DISCLAIMER: &str = "Disclaimer: This is general health guidance only, not a prescription and not a replacement for an in-person medical examination. If your symptoms persist or worsen, please consult a doctor or visit the nearest healthcare facility. In an emergency, call 193.";

const DISCLAIMER_MARKERS: [&str; 5] = [
    "disclaimer",
    "not a prescription",
    "not a replacement",
    "not medical advice",
    "consult a doctor",
];

/// Build the message sent for the current turn: an optional patient
/// context line followed by what the patient said.
pub fn build_patient_prompt(message: &str, patient_info: Option<&PatientInfo>) -> String {
    let context = patient_info.map(patient_context).unwrap_or_default();
    format!("{context}Patient says: {message}")
}

fn patient_context(info: &PatientInfo) -> String {
    let mut parts = Vec::new();
    if let Some(age) = info.age {
        parts.push(format!("Age: {age}"));
    }
    if let Some(gender) = info.gender {
        parts.push(format!("Gender: {gender}"));
    }
    if let Some(location) = info.location.as_deref().filter(|l| !l.trim().is_empty()) {
        parts.push(format!("Location: {}", location.trim()));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("Patient Information - {}\n\n", parts.join(", "))
    }
}

pub fn has_disclaimer(text: &str) -> bool {
    let lower = text.to_lowercase();
    DISCLAIMER_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Append the standard disclaimer unless the reply already carries one.
pub fn ensure_disclaimer(reply: &str) -> String {
    let reply = reply.trim_end();
    if has_disclaimer(reply) {
        reply.to_string()
    } else {
        format!("{reply}\n\n{DISCLAIMER}")
    }
}
