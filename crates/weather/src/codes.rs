//! WMO weather interpretation codes.

/// Description for codes outside the table, or missing ones.
pub const UNKNOWN_DESCRIPTION: &str = "Description indisponible";

/// French description of a weather code.
///
/// Unknown and missing codes never fail; they map to
/// [`UNKNOWN_DESCRIPTION`].
#[must_use]
pub const fn describe(code: Option<i64>) -> &'static str {
    let Some(code) = code else {
        return UNKNOWN_DESCRIPTION;
    };

    match code {
        0 => "Ciel dégagé",
        1 => "Principalement dégagé",
        2 => "Partiellement nuageux",
        3 => "Couvert",
        45 => "Brouillard",
        48 => "Brouillard givrant",
        51 => "Bruine légère",
        53 => "Bruine modérée",
        55 => "Bruine dense",
        56 => "Bruine verglaçante légère",
        57 => "Bruine verglaçante dense",
        61 => "Pluie faible",
        63 => "Pluie modérée",
        65 => "Pluie forte",
        66 => "Pluie verglaçante légère",
        67 => "Pluie verglaçante forte",
        71 => "Neige faible",
        73 => "Neige modérée",
        75 => "Neige forte",
        77 => "Grains de neige",
        80 => "Averses faibles",
        81 => "Averses modérées",
        82 => "Averses violentes",
        85 => "Averses de neige faibles",
        86 => "Averses de neige fortes",
        95 => "Orage",
        96 => "Orage avec grêle faible",
        99 => "Orage avec grêle forte",
        _ => UNKNOWN_DESCRIPTION,
    }
}
