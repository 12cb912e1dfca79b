use crate::models::UNKNOWN_LANGUAGE;

/// Texts shorter than this (after trimming) are too short to guess a language from.
pub const MIN_DETECTION_CHARS: usize = 50;

/// Detects the language of `text` as an ISO-639-1 code, or `"unknown"`.
pub fn detect_language(text: &str, min_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() < min_chars {
        return UNKNOWN_LANGUAGE.to_string();
    }

    whatlang::detect(trimmed)
        .and_then(|info| iso_639_1(info.lang().code()))
        .unwrap_or(UNKNOWN_LANGUAGE)
        .to_string()
}

fn iso_639_1(code: &str) -> Option<&'static str> {
    let short = match code {
        "rus" => "ru",
        "eng" => "en",
        "ukr" => "uk",
        "bel" => "be",
        "bul" => "bg",
        "srp" => "sr",
        "mkd" => "mk",
        "kaz" => "kk",
        "deu" => "de",
        "fra" => "fr",
        "spa" => "es",
        "ita" => "it",
        "por" => "pt",
        "nld" => "nl",
        "pol" => "pl",
        "ces" => "cs",
        "slk" => "sk",
        "slv" => "sl",
        "hrv" => "hr",
        "ron" => "ro",
        "hun" => "hu",
        "fin" => "fi",
        "swe" => "sv",
        "dan" => "da",
        "nob" => "nb",
        "est" => "et",
        "lav" => "lv",
        "lit" => "lt",
        "tur" => "tr",
        "ell" => "el",
        "heb" => "he",
        "ara" => "ar",
        "pes" => "fa",
        "hin" => "hi",
        "cmn" => "zh",
        "jpn" => "ja",
        "kor" => "ko",
        "vie" => "vi",
        "tha" => "th",
        "ind" => "id",
        _ => return None,
    };
    Some(short)
}
