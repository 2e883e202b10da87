// Built-in sample résumé, used by `--sample`.

pub const SAMPLE_RESUME: &str = r#"John Doe
john.doe@email.com
+1-555-0123
San Francisco, CA | New York, NY

PROFESSIONAL SUMMARY
Experienced Software Engineer with 5+ years developing scalable web applications and leading cross-functional teams. Passionate about clean code, system architecture, and mentoring junior developers.

WORK EXPERIENCE

Senior Software Engineer
Tech Corp, San Francisco, CA
March 2020 - Present
• Led a team of 5 developers in building microservices architecture serving 1M+ daily users
• Implemented CI/CD pipeline reducing deployment time by 60% and increasing release frequency
• Designed and built RESTful APIs handling 10,000+ requests per minute with 99.9% uptime
• Mentored 3 junior developers, improving team velocity by 40% and code quality metrics

Software Engineer
StartupXYZ, San Francisco, CA
June 2018 - February 2020
• Developed full-stack web applications using React, Node.js, and PostgreSQL
• Optimized database queries reducing page load times from 3s to 800ms
• Built automated testing suite achieving 85% code coverage and reducing bug reports by 50%

EDUCATION

Bachelor of Science in Computer Science
University of California, Berkeley
September 2014 - May 2018
• GPA: 3.8/4.0
• Dean's List: Fall 2016, Spring 2017
• Relevant coursework: Data Structures, Algorithms, Database Systems, Software Engineering

PROJECTS

E-commerce Platform
January 2023 - March 2023
https://github.com/johndoe/ecommerce-platform
• Built a full-stack e-commerce platform handling 1000+ daily transactions
• Technologies: React, Node.js, Express, PostgreSQL, Stripe API, AWS

Task Management App
September 2022 - November 2022
https://taskmanager-johndoe.herokuapp.com
• Developed a collaborative task management application with real-time updates
• Technologies: React, Socket.io, MongoDB, Express, JWT Authentication

SKILLS

Programming Languages: JavaScript, TypeScript, Python, Java, SQL
Frontend: React, Vue.js, HTML5, CSS3, Sass, Tailwind CSS
Backend: Node.js, Express, Django, Flask, RESTful APIs
Databases: PostgreSQL, MongoDB, MySQL, Redis
Cloud & DevOps: AWS, Docker, Kubernetes, CI/CD, Jenkins
Tools: Git, GitHub, VS Code, Postman, Figma

CERTIFICATIONS

AWS Certified Solutions Architect
Amazon Web Services
June 2022
https://aws.amazon.com/certification/
• Comprehensive cloud architecture and deployment strategies
• Key concepts: EC2, S3, RDS, Lambda, CloudFormation, VPC"#;
