//! Fixed greeting and farewell spoken around every story.

const INTRO_HINDI: &str = "प्यारे बच्चों, नमस्ते! कहानियों की इस जादुई दुनिया में आपका स्वागत है। \
मैं हूँ आपकी दोस्त अनामिका, और आज फिर मैं आपके लिए एक नई कहानी लाई हूँ। \
अपने भाई-बहनों और दोस्तों को भी बुला लो, क्योंकि हम कहानी शुरू करने वाले हैं!";

const OUTRO_HINDI: &str = "तो बच्चों, कैसी लगी आज की कहानी? \
इसकी सीख हमेशा याद रखना और कल फिर मिलेंगे एक नई कहानी के साथ। तब तक के लिए, अलविदा!";

const INTRO_ENGLISH: &str = "Hello, dear little friends! Welcome to our magical world of stories. \
I am your friend Anamika, and today I have brought a brand new tale for you. \
Call your brothers, sisters and friends, because the story is about to begin!";

const OUTRO_ENGLISH: &str = "So, children, how did you like today's story? \
Remember its lesson, and let's meet again tomorrow with a new tale. Until then, goodbye!";

pub fn introduction(language: &str) -> &'static str {
    if language.eq_ignore_ascii_case("english") {
        INTRO_ENGLISH
    } else {
        INTRO_HINDI
    }
}

pub fn conclusion(language: &str) -> &'static str {
    if language.eq_ignore_ascii_case("english") {
        OUTRO_ENGLISH
    } else {
        OUTRO_HINDI
    }
}

/// Full narration script: greeting, story, farewell.
pub fn narration(language: &str, content: &str) -> String {
    format!(
        "{}\n\n{}\n\n{}",
        introduction(language),
        content.trim(),
        conclusion(language)
    )
}
