pub mod extract;
pub mod segment;

use tracing::debug;

use crate::card::Card;
use extract::FieldExtractor;

/// Two-pass pipeline: text → publication chunks → cards.
pub fn parse_document(body: &str, extractor: &FieldExtractor) -> Vec<Card> {
    let chunks = segment::split_publications(body);
    let cards: Vec<Card> = chunks.iter().flat_map(|c| extractor.extract(c)).collect();
    debug!(
        chunks = chunks.len(),
        cards = cards.len(),
        convention = ?extractor.convention(),
        "Parsed document"
    );
    cards
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boards::BoardDirectory;
    use extract::TagConvention;

    fn parse(fixture: &str, convention: TagConvention) -> Vec<Card> {
        let body = std::fs::read_to_string(format!("tests/fixtures/{}.txt", fixture)).unwrap();
        let boards = BoardDirectory::default();
        parse_document(&body, &FieldExtractor::new(&boards, convention))
    }

    #[test]
    fn empty_document() {
        let boards = BoardDirectory::default();
        let extractor = FieldExtractor::new(&boards, TagConvention::Responsible);
        assert!(parse_document("", &extractor).is_empty());
    }

    #[test]
    fn relatorio_responsible() {
        let cards = parse("relatorio", TagConvention::Responsible);
        // entry 2 says "Nada a fazer", entry 3 has two owners
        let owners: Vec<&str> = cards.iter().map(|c| c.owner.as_str()).collect();
        assert_eq!(owners, vec!["ANA", "FERNANDA", "EVERSON", "MARCELA"]);

        assert_eq!(cards[0].title, "Apelação cível - intimação de acórdão");
        assert!(cards[0].comment.starts_with("1. Processo 0001234-56.2024.8.26.0100\n"));
        assert_eq!(cards[0].comment.lines().count(), 6);

        assert_eq!(cards[1].title, cards[2].title);
        assert_eq!(cards[1].comment, cards[2].comment);
        assert_ne!(cards[1].description, cards[2].description);

        // last entry has no trailing blank line in the fixture
        assert_eq!(cards[3].description, "Contestar até 15/03.");
    }

    #[test]
    fn relatorio_board_name() {
        let cards = parse("relatorio_quadros", TagConvention::BoardName);
        let owners: Vec<&str> = cards.iter().map(|c| c.owner.as_str()).collect();
        assert_eq!(owners, vec!["ANA", "EVERSON", "FERNANDA"]);
        assert!(cards.iter().all(|c| c.title.to_uppercase() != "NADA"));
    }

    #[test]
    fn card_invariants() {
        for convention in [TagConvention::Responsible, TagConvention::BoardName] {
            for fixture in ["relatorio", "relatorio_quadros"] {
                for card in parse(fixture, convention) {
                    assert!(!card.description.ends_with('\n'), "{:?}", card);
                    assert_eq!(card.owner, card.owner.to_uppercase());
                }
            }
        }
    }
}
