use std::collections::{BTreeMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;

/// One answer button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizOption {
    pub id: &'static str,
    pub name: &'static str,
    pub logo: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub id: u32,
    pub prompt: &'static str,
    pub options: [QuizOption; 2],
    pub correct_answer: &'static str,
    pub explanation: &'static str,
    pub category: &'static str,
}

impl Question {
    pub fn is_correct(&self, option_id: &str) -> bool {
        self.correct_answer == option_id
    }

    pub fn option(&self, option_id: &str) -> Option<&QuizOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}

/// Count of questions per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankStats {
    pub total_questions: usize,
    pub categories: BTreeMap<&'static str, usize>,
}

const fn opt(id: &'static str, name: &'static str, logo: &'static str, description: &'static str) -> QuizOption {
    QuizOption { id, name, logo, description }
}

const YES: QuizOption = opt("yes", "Yes", "✅", "True");
const NO: QuizOption = opt("no", "No", "❌", "False");
const USDT: QuizOption = opt("usdt", "USDT", "₮", "Tether");
const USDC: QuizOption = opt("usdc", "USDC", "◉", "USD Coin");
const DAI: QuizOption = opt("dai", "DAI", "◈", "MakerDAO");
const AMPL: QuizOption = opt("ampl", "AMPL", "🔄", "Ampleforth");
const FRAX: QuizOption = opt("frax", "FRAX", "⬢", "Frax Protocol");
const USDY: QuizOption = opt("usdy", "USDY", "🏛️", "Ondo USDY");
const USDE: QuizOption = opt("usde", "USDe", "🔷", "Ethena USD");

const fn year(id: &'static str, description: &'static str) -> QuizOption {
    opt(id, id, "📅", description)
}

pub static QUESTIONS: &[Question] = &[
    Question {
        id: 1,
        prompt: "The first stablecoin ever created?",
        options: [USDC, USDT],
        correct_answer: "usdt",
        explanation: "USDT (Tether) was launched in 2014 and became the first widely used stablecoin.",
        category: "history",
    },
    Question {
        id: 2,
        prompt: "DAI was originally called?",
        options: [USDC, opt("sai", "Sai", "◈", "Single-Collateral DAI")],
        correct_answer: "sai",
        explanation: "DAI was originally called Sai when it was single-collateral backed only by ETH.",
        category: "history",
    },
    Question {
        id: 3,
        prompt: "USDC was announced in which year?",
        options: [year("2019", "Year 2019"), year("2018", "Year 2018")],
        correct_answer: "2018",
        explanation: "USDC was announced by Circle and Coinbase in 2018.",
        category: "history",
    },
    Question {
        id: 4,
        prompt: "Tether was launched in...?",
        options: [year("2015", "Year 2015"), year("2014", "Year 2014")],
        correct_answer: "2014",
        explanation: "Tether was launched in 2014 as the first major stablecoin.",
        category: "history",
    },
    Question {
        id: 5,
        prompt: "MakerDAO launched DAI in December...?",
        options: [year("2016", "Year 2016"), year("2017", "Year 2017")],
        correct_answer: "2017",
        explanation: "MakerDAO launched DAI in December 2017.",
        category: "history",
    },
    Question {
        id: 7,
        prompt: "USDC lost its peg due to SVB collapse in...?",
        options: [year("2020", "Year 2020"), year("2023", "Year 2023")],
        correct_answer: "2023",
        explanation: "USDC temporarily lost its peg in March 2023 due to Silicon Valley Bank collapse.",
        category: "events",
    },
    Question {
        id: 8,
        prompt: "Tether lost its peg in May 2022?",
        options: [NO, YES],
        correct_answer: "yes",
        explanation: "Tether briefly lost its peg during the Terra Luna collapse in May 2022.",
        category: "events",
    },
    Question {
        id: 9,
        prompt: "Algorithmic crash related to UST?",
        options: [YES, NO],
        correct_answer: "yes",
        explanation: "UST was an algorithmic stablecoin that crashed in May 2022.",
        category: "failures",
    },
    Question {
        id: 10,
        prompt: "Centralized issuer of USDC is Circle?",
        options: [YES, NO],
        correct_answer: "yes",
        explanation: "Circle is the centralized issuer of USDC.",
        category: "issuers",
    },
    Question {
        id: 11,
        prompt: "Fiat-backed stablecoin?",
        options: [USDT, DAI],
        correct_answer: "usdt",
        explanation: "USDT is backed by fiat reserves, while DAI is crypto-collateralized.",
        category: "backing",
    },
    Question {
        id: 12,
        prompt: "Crypto-backed stablecoin?",
        options: [DAI, USDC],
        correct_answer: "dai",
        explanation: "DAI is backed by cryptocurrency collateral, primarily ETH.",
        category: "backing",
    },
    Question {
        id: 13,
        prompt: "Backed by gold?",
        options: [USDC, opt("paxg", "PAXG", "🥇", "Pax Gold")],
        correct_answer: "paxg",
        explanation: "PAXG (Pax Gold) is backed by physical gold reserves.",
        category: "backing",
    },
    Question {
        id: 14,
        prompt: "Algorithmic stablecoin?",
        options: [USDT, AMPL],
        correct_answer: "ampl",
        explanation: "AMPL uses algorithmic rebasing to maintain its peg.",
        category: "mechanisms",
    },
    Question {
        id: 15,
        prompt: "Hybrid algorithm + reserves?",
        options: [DAI, FRAX],
        correct_answer: "frax",
        explanation: "FRAX uses a hybrid model combining algorithmic mechanisms with collateral backing.",
        category: "mechanisms",
    },
    Question {
        id: 16,
        prompt: "Backed by US Treasuries?",
        options: [USDC, USDY],
        correct_answer: "usdy",
        explanation: "USDY is specifically backed by US Treasury securities.",
        category: "backing",
    },
    Question {
        id: 17,
        prompt: "Uncollateralized algorithmic token?",
        options: [USDE, opt("lusd", "LUSD", "🔵", "Liquity USD")],
        correct_answer: "usde",
        explanation: "USDe uses delta hedging strategies rather than traditional collateral.",
        category: "mechanisms",
    },
    Question {
        id: 19,
        prompt: "Over-collateralized implementation?",
        options: [FRAX, DAI],
        correct_answer: "dai",
        explanation: "DAI requires over-collateralization to maintain stability.",
        category: "mechanisms",
    },
    Question {
        id: 20,
        prompt: "Fully decentralized coin?",
        options: [USDT, DAI],
        correct_answer: "dai",
        explanation: "DAI is governed by a decentralized autonomous organization (MakerDAO).",
        category: "decentralization",
    },
    Question {
        id: 21,
        prompt: "Circle issues...?",
        options: [USDT, USDC],
        correct_answer: "usdc",
        explanation: "Circle is the issuer of USDC (USD Coin).",
        category: "issuers",
    },
    Question {
        id: 24,
        prompt: "Ethena issues...?",
        options: [USDE, USDY],
        correct_answer: "usde",
        explanation: "Ethena protocol issues USDe synthetic dollar.",
        category: "issuers",
    },
    Question {
        id: 26,
        prompt: "USDT has the largest market cap?",
        options: [YES, NO],
        correct_answer: "yes",
        explanation: "USDT maintains the largest market capitalization among stablecoins.",
        category: "market-data",
    },
];

pub fn find(id: u32) -> Option<&'static Question> {
    QUESTIONS.iter().find(|q| q.id == id)
}

/// Pick a question that is not in `recent`; any question once every id is recent.
pub fn next_question<R: Rng + ?Sized>(recent: &[u32], rng: &mut R) -> &'static Question {
    let available: Vec<&'static Question> = QUESTIONS.iter().filter(|q| !recent.contains(&q.id)).collect();
    match available.choose(rng) {
        Some(q) => *q,
        None => &QUESTIONS[rng.gen_range(0..QUESTIONS.len())],
    }
}

/// Up to `count` distinct questions in random order.
pub fn unique_random_questions<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<&'static Question> {
    let mut all: Vec<&'static Question> = QUESTIONS.iter().collect();
    all.shuffle(rng);
    all.truncate(count);
    all
}

pub fn categories() -> Vec<&'static str> {
    let mut seen = Vec::new();
    for q in QUESTIONS {
        if !seen.contains(&q.category) {
            seen.push(q.category);
        }
    }
    seen
}

pub fn by_category(category: &str) -> Vec<&'static Question> {
    QUESTIONS.iter().filter(|q| q.category == category).collect()
}

pub fn stats() -> BankStats {
    let mut categories = BTreeMap::new();
    for q in QUESTIONS {
        *categories.entry(q.category).or_insert(0) += 1;
    }
    BankStats { total_questions: QUESTIONS.len(), categories }
}

pub fn ids_unique(questions: &[&Question]) -> bool {
    let mut seen = HashSet::new();
    questions.iter().all(|q| seen.insert(q.id))
}
