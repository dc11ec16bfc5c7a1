//! Small text helpers shared by the sync payload builder.

/// Derive a URL-safe slug from a display title.
///
/// Lowercases, strips everything but word characters, spaces and hyphens,
/// then collapses runs of spaces/hyphens into single hyphens. Returns an
/// empty string when nothing survives; callers must supply their own
/// fallback in that case.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let filtered: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == ' ' || *c == '-')
        .collect();

    let mut slug = String::with_capacity(filtered.len());
    let mut last_was_hyphen = true; // swallow leading separators
    for c in filtered.chars() {
        if c == ' ' || c == '-' {
            if !last_was_hyphen {
                slug.push('-');
                last_was_hyphen = true;
            }
        } else {
            slug.push(c);
            last_was_hyphen = false;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_hyphenates() {
        assert_eq!(slugify("Clase de Yoga Suave"), "clase-de-yoga-suave");
    }

    #[test]
    fn strips_punctuation() {
        assert_eq!(slugify("Masaje: Piedras (Calientes)!"), "masaje-piedras-calientes");
    }

    #[test]
    fn collapses_separator_runs() {
        assert_eq!(slugify("  doble  --  espacio  "), "doble-espacio");
    }

    #[test]
    fn empty_when_nothing_survives() {
        assert_eq!(slugify("¡¿!?"), "");
    }

    #[test]
    fn simple_title() {
        assert_eq!(slugify("Test"), "test");
    }
}
