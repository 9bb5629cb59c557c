use rand::prelude::IndexedRandom;
use rand::Rng;

/// Product identifiers exercised by the journey (Online Boutique demo catalog).
pub const PRODUCTS: [&str; 9] = [
    "OLJCESPC7Z", // vintage typewriter
    "66VCHSJNUP", // vintage camera lens
    "1YMWWN1N4O", // home barista kit
    "L9ECAV7KIM", // terrarium
    "2ZYFJ3GM2N", // film camera
    "0PUK6V6EV0", // vintage record player
    "LS4PSXUNUM", // metal camping mug
    "9SIQT8TOJO", // city bike
    "6E92ZMYYFZ", // air plant
];

/// Search vocabulary used by the optional search step.
pub const SEARCH_TERMS: [&str; 5] = ["vintage", "camera", "plant", "bike", "mug"];

pub fn random_product<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    PRODUCTS.choose(rng).copied().unwrap()
}

pub fn random_search_term<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    SEARCH_TERMS.choose(rng).copied().unwrap()
}
