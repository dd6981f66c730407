//! Maps a parcel address to the Bizinfo region hashtag.
//!
//! Bizinfo filters projects by a short region tag (`서울`, `충북`, ...).
//! Addresses may spell the region out in full (`충청북도`), use the short
//! form, or be romanized (`Chungcheongbuk-do`). When several regions appear
//! in one address, the earliest mention wins: Korean addresses name the
//! province before the city, so `경기도 광주시` resolves to `경기`.

/// Region tags accepted by the API, each with the spellings that select it.
const REGIONS: &[(&str, &[&str])] = &[
    ("서울", &["서울", "seoul"]),
    ("부산", &["부산", "busan"]),
    ("대구", &["대구", "daegu"]),
    ("인천", &["인천", "incheon"]),
    ("광주", &["광주", "gwangju"]),
    ("대전", &["대전", "daejeon"]),
    ("울산", &["울산", "ulsan"]),
    ("세종", &["세종", "sejong"]),
    ("경기", &["경기", "gyeonggi"]),
    ("강원", &["강원", "gangwon"]),
    ("충북", &["충청북도", "충북", "chungcheongbuk", "chungbuk"]),
    ("충남", &["충청남도", "충남", "chungcheongnam", "chungnam"]),
    ("전북", &["전라북도", "전북", "jeollabuk", "jeonbuk"]),
    ("전남", &["전라남도", "전남", "jeollanam", "jeonnam"]),
    ("경북", &["경상북도", "경북", "gyeongsangbuk", "gyeongbuk"]),
    ("경남", &["경상남도", "경남", "gyeongsangnam", "gyeongnam"]),
    ("제주", &["제주", "jeju"]),
];

/// Returns the region tag for `address`, or `None` if no region is named.
pub fn region_tag(address: &str) -> Option<&'static str> {
    let lowered = address.to_lowercase();
    let haystack = lowered.as_str();
    REGIONS
        .iter()
        .flat_map(|&(tag, spellings)| {
            spellings.iter().filter_map(move |&spelling| {
                haystack
                    .find(spelling)
                    .map(|pos| (pos, std::cmp::Reverse(spelling.len()), tag))
            })
        })
        .min()
        .map(|(_, _, tag)| tag)
}
