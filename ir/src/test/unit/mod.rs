mod params;
