/// Registered KNX manufacturer ids, sorted by id.
static MANUFACTURERS: [(u16, &str); 52] = [
    (1, "Siemens"),
    (2, "ABB"),
    (4, "Albrecht Jung"),
    (5, "Bticino"),
    (6, "Berker"),
    (7, "Busch-Jaeger Elektro"),
    (8, "GIRA Giersiepen"),
    (9, "Hager Electro"),
    (10, "Insta GmbH"),
    (11, "LEGRAND Appareillage électrique"),
    (12, "Merten"),
    (14, "ABB SpA-SACE Division"),
    (22, "Siedle & Söhne"),
    (24, "Eberle"),
    (25, "GEWISS"),
    (27, "Albert Ackermann"),
    (28, "Schupa GmbH"),
    (29, "ABB SCHWEIZ"),
    (30, "Feller"),
    (32, "DEHN & SÖHNE"),
    (33, "CRABTREE"),
    (36, "Paul Hochköpper"),
    (37, "Altenburger Electronic"),
    (41, "Grässlin"),
    (42, "Simon"),
    (44, "VIMAR"),
    (45, "Moeller Gebäudeautomation KG"),
    (46, "Eltako"),
    (49, "Bosch-Siemens Haushaltsgeräte"),
    (52, "RITTO GmbH&Co.KG"),
    (53, "Power Controls"),
    (55, "ZUMTOBEL"),
    (57, "Phoenix Contact"),
    (61, "WAGO Kontakttechnik"),
    (66, "Wieland Electric"),
    (67, "Hermann Kleinhuis"),
    (69, "Stiebel Eltron"),
    (71, "Tehalit"),
    (72, "Theben AG"),
    (73, "Wilhelm Rutenbeck"),
    (75, "Winkhaus"),
    (76, "Robert Bosch"),
    (78, "Somfy"),
    (80, "Woertz"),
    (81, "Viessmann Werke"),
    (83, "Joh. Vaillant"),
    (100, "Schneider Electric Industries SAS"),
    (107, "WAREMA Renkhoff SE"),
    (113, "Zennio"),
    (114, "TAPKO Technologies"),
    (131, "MDT technologies"),
    (197, "Weinzierl Engineering GmbH"),
];

pub fn name(id: u16) -> Option<&'static str> {
    MANUFACTURERS
        .binary_search_by_key(&id, |&(id, _)| id)
        .ok()
        .map(|index| MANUFACTURERS[index].1)
}

#[cfg(test)]
mod tests {
    #[test]
    fn table_is_sorted() {
        assert!(super::MANUFACTURERS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn lookup() {
        assert_eq!(super::name(197), Some("Weinzierl Engineering GmbH"));
        assert_eq!(super::name(1), Some("Siemens"));
        assert_eq!(super::name(3), None);
    }
}
