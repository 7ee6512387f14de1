//! Plain-English renderings of gene products and feature types.

use std::sync::OnceLock;

use regex::Regex;

const AMINO_ACIDS: [(&str, &str); 20] = [
    ("Ala", "Alanine"),
    ("Arg", "Arginine"),
    ("Asn", "Asparagine"),
    ("Asp", "Aspartic acid"),
    ("Cys", "Cysteine"),
    ("Glu", "Glutamic acid"),
    ("Gln", "Glutamine"),
    ("Gly", "Glycine"),
    ("His", "Histidine"),
    ("Ile", "Isoleucine"),
    ("Leu", "Leucine"),
    ("Lys", "Lysine"),
    ("Met", "Methionine"),
    ("Phe", "Phenylalanine"),
    ("Pro", "Proline"),
    ("Ser", "Serine"),
    ("Thr", "Threonine"),
    ("Trp", "Tryptophan"),
    ("Tyr", "Tyrosine"),
    ("Val", "Valine"),
];

const ROMAN: [&str; 10] = ["i", "ii", "iii", "iv", "v", "vi", "vii", "viii", "ix", "x"];

struct Patterns {
    comment: Regex,
    rna_splitter: Regex,
    rna_namer: Regex,
    lsu: Regex,
    ssu: Regex,
    trna: Regex,
    trna_alt: Regex,
    trna_pseudo: Regex,
    descriptive: Regex,
    subtype: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        comment: Regex::new(r"\s*[#!].+").unwrap(),
        rna_splitter: Regex::new(r"(?:\s+#+|;)\s+").unwrap(),
        rna_namer: Regex::new(r"(?i)\b(?:ribosomal\s+)?r?RNA\b").unwrap(),
        lsu: Regex::new(
            r"(?i)LSU\s+rRNA|Large\s+Subunit\s+(?:Ribosomal\s+)?r?RNA|lsuRNA|23S\s+(?:r(?:ibosomal\s+)?)?RNA",
        )
        .unwrap(),
        ssu: Regex::new(
            r"(?i)SSU\s+rRNA|Small\s+Subunit\s+(?:Ribosomal\s+)?r?RNA|ssuRNA|16S\s+(?:r(?:ibosomal\s+)?)?RNA",
        )
        .unwrap(),
        trna: Regex::new(r"^tRNA-(\w{3})(?:-([A-Z]{3})|-\d+)?$").unwrap(),
        trna_alt: Regex::new(r"^(\w{3})\s+tRNA.*$").unwrap(),
        trna_pseudo: Regex::new(r"^tRNA-Pseudo-([A-Z]{3})$").unwrap(),
        descriptive: Regex::new(r"(?i)^[\w-]+-containing$").unwrap(),
        subtype: Regex::new(r"^(.+)\s+=>\s+(.+)$").unwrap(),
    })
}

/// Describe a gene product according to the type of feature that carries it.
///
/// ```
/// use poplines::describe_product;
///
/// assert_eq!(
///     describe_product("tRNA-Ala-GGC", "tRNA"),
///     "a transfer RNA for Alanine from codon GGC"
/// );
/// assert_eq!(describe_product("", "repeat_region"), "a repeat region");
/// ```
pub fn describe_product(product: &str, feature_type: &str) -> String {
    match feature_type {
        "tRNA" => transfer_rna(product),
        "rRNA" => ribosomal_rna(product),
        "misc_RNA" => misc_rna(product),
        "CDS" => protein(product),
        other => {
            let phrase = other.replace('_', " ");
            if phrase.trim().is_empty() {
                prefix_article("unknown feature")
            } else {
                prefix_article(&phrase)
            }
        }
    }
}

/// The predicate phrase for a feature type, as in "this feature *is an intron*".
pub fn feature_type_phrase(feature_type: &str) -> String {
    let phrase = match feature_type {
        "CDS" => "is a protein-producing coding region",
        "gene" => "is a protein-producing gene",
        "source" => "is a source",
        "5'UTR" => "is a 5'-end untranslated region",
        "mRNA" => "produces messenger RNA",
        "3'UTR" => "is a 3'-end untranslated region",
        "misc_feature" | "unsure" | "misc_difference" => "is an unknown type of feature",
        "misc_RNA" => "produces miscellaneous RNA",
        "assembly_gap" | "gap" => "represents a gap",
        "intron" => "is an intron",
        "sig_peptide" => "produces a signal peptide",
        "mat_peptide" => "produces a mature peptide",
        "primer_bind" => "is a primer binding",
        "stem_loop" => "is a stem loop",
        other => return format!("is a {other} feature"),
    };
    phrase.to_string()
}

/// Put "a" or "an" in front of a phrase.
pub fn prefix_article(phrase: &str) -> String {
    let article = match phrase.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('a' | 'e' | 'i' | 'o' | 'u' | '8') => "an",
        _ => "a",
    };
    format!("{article} {phrase}")
}

fn comment_free(product: &str) -> String {
    patterns().comment.replace(product, "").into_owned()
}

fn split_whole<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    text.split(separator)
        .filter(|piece| !piece.is_empty())
        .collect()
}

fn amino_acid(code: &str) -> String {
    AMINO_ACIDS
        .iter()
        .find(|(abbr, _)| *abbr == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("an unknown amino acid {code}"))
}

fn transfer_rna(product: &str) -> String {
    if product.trim().is_empty() {
        return "an unknown type of transfer RNA".into();
    }
    let pats = patterns();
    if let Some(caps) = pats.trna.captures(product) {
        let codon = caps
            .get(2)
            .map(|codon| format!(" from codon {}", codon.as_str()))
            .unwrap_or_default();
        format!("a transfer RNA for {}{codon}", amino_acid(&caps[1]))
    } else if let Some(caps) = pats.trna_alt.captures(product) {
        format!("a transfer RNA for {}", amino_acid(&caps[1]))
    } else if let Some(caps) = pats.trna_pseudo.captures(product) {
        format!("a pseudo-transfer RNA for codon {}", &caps[1])
    } else {
        "a transfer RNA of unknown type".into()
    }
}

fn ribosomal_rna(product: &str) -> String {
    let pats = patterns();
    if product.trim().is_empty() {
        return "an unknown ribosomal RNA".into();
    }
    if pats.lsu.is_match(product) {
        return "a large subunit ribosomal RNA".into();
    }
    if pats.ssu.is_match(product) {
        return "a 16S small subunit ribosomal RNA".into();
    }

    // The longest piece wins; ties go to the first.
    let longest = pats
        .rna_splitter
        .split(product)
        .fold("", |best, piece| {
            if piece.len() > best.len() {
                piece
            } else {
                best
            }
        });
    match pats.rna_namer.find(longest) {
        None => format!("a ribosomal RNA of type {longest}"),
        Some(m) => prefix_article(&format!(
            "{}ribosomal RNA{}",
            &longest[..m.start()],
            &longest[m.end()..]
        )),
    }
}

fn misc_rna(product: &str) -> String {
    if product.trim().is_empty() {
        "a miscellaneous RNA".into()
    } else {
        format!(
            "a miscellaneous RNA believed to be {}",
            comment_free(product)
        )
    }
}

fn protein(product: &str) -> String {
    if product.trim().is_empty() || product.eq_ignore_ascii_case("hypothetical protein") {
        return "a hypothetical protein".into();
    }
    let body = comment_free(product);
    let domains = split_whole(&body, " / ");
    if domains.len() <= 1 {
        return format!("a protein whose product is {}", domain(&body));
    }

    let last = domains.len() - 1;
    let mut text = format!(
        "a protein with {} domains, whose products are: (1) {}",
        domains.len(),
        domain(domains[0])
    );
    for (i, piece) in domains.iter().enumerate().take(last).skip(1) {
        text.push_str(&format!("; ({}) {}", i + 1, domain(piece)));
    }
    text.push_str(&format!("; and ({}) {}", last + 1, domain(domains[last])));
    text
}

fn domain(text: &str) -> String {
    let alternatives = split_whole(text, "; ");
    if alternatives.len() <= 1 {
        return function(text);
    }

    let letter = |i: usize| char::from(b'a' + (i % 26) as u8);
    let last = alternatives.len() - 1;
    let mut out = format!(
        "an ambiguous function with {} possibilities, including (a) {}",
        alternatives.len(),
        function(alternatives[0])
    );
    for (i, piece) in alternatives.iter().enumerate().take(last).skip(1) {
        out.push_str(&format!(", ({}) {}", letter(i), function(piece)));
    }
    out.push_str(&format!(
        ", or ({}) {}",
        letter(last),
        function(alternatives[last])
    ));
    out
}

fn function(text: &str) -> String {
    let roles = split_whole(text, " @ ");
    match roles.as_slice() {
        [] | [_] => role(text),
        [first, second] if patterns().descriptive.is_match(second) => {
            format!("{} ({second})", role(first))
        }
        [first, second] if second.starts_with(first) => role(second),
        _ => {
            let last = roles.len() - 1;
            let mut out = format!("{} roles including (i) {}", roles.len(), role(roles[0]));
            for (i, piece) in roles.iter().enumerate().take(last).skip(1) {
                out.push_str(&format!(", ({}) {}", numeral(i), role(piece)));
            }
            out.push_str(&format!(", and ({}) {}", numeral(last), role(roles[last])));
            out
        }
    }
}

fn numeral(i: usize) -> String {
    match ROMAN.get(i) {
        Some(roman) => roman.to_string(),
        None => (i + 1).to_string(),
    }
}

fn role(text: &str) -> String {
    match patterns().subtype.captures(text) {
        Some(caps) => format!("{}, a subtype of {}", &caps[1], &caps[2]),
        None => text.to_string(),
    }
}
