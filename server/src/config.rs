// Fixed deployment constants, exposed as configuration rather
// than baked into the protocol engine.

pub struct ExamConfig {
    pub addr: String,
    pub max_clients: usize,
    pub students: Vec<String>,
    pub question: String,
    pub answer: String,
}

pub struct ExamConfigBuilder {
    addr: String,
    max_clients: usize,
    students: Vec<String>,
    question: String,
    answer: String,
}

impl ExamConfig {
    pub fn builder() -> ExamConfigBuilder {
        ExamConfigBuilder {
            addr: "127.0.0.1:8080".to_string(),
            max_clients: 4,
            students: vec![
                "student1".to_string(),
                "student2".to_string(),
                "student3".to_string(),
                "student4".to_string(),
            ],
            question: "What is 2+2? (a)3 (b)4 (c)5".to_string(),
            answer: "b".to_string(),
        }
    }

    // allow-list check, exact and case sensitive
    pub fn is_allowed(&self, username: &str) -> bool {
        self.students.iter().any(|s| s == username)
    }

    // grade by exact match against the accepted answer
    pub fn grade(&self, submission: &[u8]) -> bool {
        self.answer.as_bytes() == submission
    }
}

impl Default for ExamConfig {
    fn default() -> Self {
        ExamConfig::builder().build()
    }
}

impl ExamConfigBuilder {
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn max_clients(mut self, max: usize) -> Self {
        self.max_clients = max;
        self
    }

    pub fn students(mut self, students: Vec<String>) -> Self {
        self.students = students;
        self
    }

    pub fn question(mut self, question: impl Into<String>) -> Self {
        self.question = question.into();
        self
    }

    pub fn answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = answer.into();
        self
    }

    pub fn build(self) -> ExamConfig {
        ExamConfig {
            addr: self.addr,
            max_clients: self.max_clients,
            students: self.students,
            question: self.question,
            answer: self.answer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_deployment() {
        let config = ExamConfig::default();
        assert_eq!(config.max_clients, 4);
        assert!(config.is_allowed("student1"));
        assert!(config.is_allowed("student4"));
        assert!(config.grade(b"b"));
    }

    #[test]
    fn allow_list_is_exact_and_case_sensitive() {
        let config = ExamConfig::default();
        assert!(!config.is_allowed("Student1"));
        assert!(!config.is_allowed("student1 "));
        assert!(!config.is_allowed("student5"));
    }

    #[test]
    fn builder_overrides_apply() {
        let config = ExamConfig::builder()
            .addr("0.0.0.0:9000")
            .max_clients(2)
            .students(vec!["ada".to_string()])
            .question("1+1?")
            .answer("2")
            .build();

        assert_eq!(config.addr, "0.0.0.0:9000");
        assert_eq!(config.max_clients, 2);
        assert!(config.is_allowed("ada"));
        assert!(!config.is_allowed("student1"));
        assert!(config.grade(b"2"));
        assert!(!config.grade(b"b"));
    }
}
