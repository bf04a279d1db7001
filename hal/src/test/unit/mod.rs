mod caps;
