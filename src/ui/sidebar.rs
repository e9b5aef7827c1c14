use crate::api::models::Partner;

pub const EMPTY_LABEL: &str = "No doctors found";

/// One line per doctor, numbered for `/open <n>`; the open one is starred.
pub fn render(partners: &[Partner], active: Option<&str>) -> Vec<String> {
    if partners.is_empty() {
        return vec![format!("   {}", EMPTY_LABEL)];
    }
    partners
        .iter()
        .enumerate()
        .map(|(idx, p)| {
            let marker = if Some(p.id.as_str()) == active { '*' } else { ' ' };
            format!("{} {:>2}. {} ({})", marker, idx + 1, p.display_name(), p.specialty_label())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_active_partner_and_defaults_specialty() {
        let partners = vec![
            Partner {
                id: "d1".into(),
                first_name: "Ana".into(),
                last_name: "Costa".into(),
                email: String::new(),
                specialty: Some("Cardio".into()),
            },
            Partner {
                id: "d2".into(),
                first_name: "Leo".into(),
                last_name: String::new(),
                email: String::new(),
                specialty: None,
            },
        ];
        let lines = render(&partners, Some("d2"));
        assert_eq!(lines, ["   1. Dr. Ana Costa (Cardio)", "*  2. Dr. Leo (Doctor)"]);
    }

    #[test]
    fn empty_list_says_so() {
        assert_eq!(render(&[], None), [format!("   {}", EMPTY_LABEL)]);
    }
}
